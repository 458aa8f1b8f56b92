//! Reduction of captured tool output into structured results

pub mod reader;

pub use reader::{ReadOutcome, ResultReader};
