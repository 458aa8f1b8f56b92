//! Decoded form of the iperf3 JSON report
//!
//! Every section tolerates missing fields so that partial documents (for
//! example a run that failed right after connecting) still decode. Type
//! mismatches are the only decode failures.

use serde::{Deserialize, Serialize};

/// A complete measurement report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementResult {
    pub start: StartSection,
    pub intervals: Vec<IntervalSection>,
    pub end: EndSection,
    /// Failure text the tool embeds in the document when a test aborts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server-side report echoed by `--get-server-output`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_output_json: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_output_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartSection {
    pub connected: Vec<Connection>,
    pub version: String,
    pub system_info: String,
    pub timestamp: Timestamp,
    pub connecting_to: ConnectingTo,
    pub cookie: String,
    pub tcp_mss_default: u64,
    pub test_start: TestParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub socket: i64,
    pub local_host: String,
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timestamp {
    pub time: String,
    pub timesecs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectingTo {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParameters {
    pub protocol: String,
    pub num_streams: u32,
    pub blksize: u64,
    pub omit: u32,
    pub duration: u32,
    pub bytes: u64,
    pub blocks: u64,
    pub reverse: u8,
}

/// Per-interval samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalSection {
    pub streams: Vec<StreamSample>,
    pub sum: IntervalSum,
}

/// One stream's figures over an interval or over the whole test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSample {
    pub socket: i64,
    pub start: f64,
    pub end: f64,
    pub seconds: f64,
    pub bytes: u64,
    pub bits_per_second: f64,
    pub omitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retransmits: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_packets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets: Option<u64>,
}

/// Aggregate over all streams
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalSum {
    pub start: f64,
    pub end: f64,
    pub seconds: f64,
    pub bytes: u64,
    pub bits_per_second: f64,
    pub omitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retransmits: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_packets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packets: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSummary {
    pub sender: StreamSample,
    pub receiver: StreamSample,
    /// UDP runs report a single combined record instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp: Option<StreamSample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuUtilization {
    pub host_total: f64,
    pub host_user: f64,
    pub host_system: f64,
    pub remote_total: f64,
    pub remote_user: f64,
    pub remote_system: f64,
}

/// Aggregate results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndSection {
    pub streams: Vec<StreamSummary>,
    pub sum_sent: IntervalSum,
    pub sum_received: IntervalSum,
    /// UDP aggregate with jitter and loss
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<IntervalSum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_sent_bidir_reverse: Option<IntervalSum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_received_bidir_reverse: Option<IntervalSum>,
    pub cpu_utilization_percent: CpuUtilization,
}

impl MeasurementResult {
    /// Whether the tool reported an aborted test inside the document
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Aggregate sender bitrate
    pub fn sent_bits_per_second(&self) -> f64 {
        self.end.sum_sent.bits_per_second
    }

    /// Aggregate receiver bitrate, falling back to the UDP sum
    pub fn received_bits_per_second(&self) -> f64 {
        if self.end.sum_received.bits_per_second > 0.0 {
            self.end.sum_received.bits_per_second
        } else {
            self.end.sum.as_ref().map_or(0.0, |sum| sum.bits_per_second)
        }
    }

    /// Intervals that count towards statistics (not in the omit window)
    pub fn counted_intervals(&self) -> impl Iterator<Item = &IntervalSection> {
        self.intervals.iter().filter(|interval| !interval.sum.omitted)
    }
}
