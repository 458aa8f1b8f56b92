//! Data models for the iperf3 runner

pub mod config;
pub mod result;

pub use config::{Config, ServerSettings, ClientSettings};
pub use result::{
    MeasurementResult, StartSection, IntervalSection, EndSection,
    StreamSample, IntervalSum, StreamSummary, CpuUtilization,
};
