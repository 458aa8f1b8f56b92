//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    executor::SessionSummary,
    models::{IntervalSection, MeasurementResult},
    process::RunOutcome,
    report::ReadOutcome,
    resources::ResourceUsage,
    types::Role,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Progress line printed before each run of a repeat sequence
    fn format_iteration(&self, iteration: u32, total: u32) -> Result<String>;

    /// Summary of one finished run
    fn format_run_outcome(&self, outcome: &RunOutcome) -> Result<String>;

    /// Per-interval throughput table
    fn format_intervals(&self, result: &MeasurementResult) -> Result<String>;

    /// Totals over a whole repeat sequence
    fn format_session_summary(&self, summary: &SessionSummary) -> Result<String>;

    fn format_resource_usage(&self, role: Role, usage: &ResourceUsage) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Include interval tables and stderr text
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let column_widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &column_widths, format));
            output.push('\n');

            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        output
    }

    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format.columns.len().max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let base = format.columns.get(col_idx)
                    .map_or(0, |c| c.min_width.max(c.header.len()));
                rows.iter()
                    .filter_map(|row| row.get(col_idx))
                    .map(|cell| cell.chars().count())
                    .fold(base, usize::max)
            })
            .collect()
    }

    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format.columns.get(idx).map_or(&Alignment::Left, |c| &c.alignment);
            let padded_cell = align_text(cell, width, alignment);

            if format.show_borders {
                row.push(' ');
                row.push_str(&padded_cell);
                row.push_str(" |");
            } else {
                row.push_str(&padded_cell);
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }

    /// Key figures of a decoded report, one per line
    pub(crate) fn result_lines(&self, result: &MeasurementResult) -> Vec<(String, String)> {
        let mut lines = Vec::new();
        let start = &result.start;

        if let Some(connection) = start.connected.first() {
            lines.push((
                "Connection".to_string(),
                format!("{}:{} -> {}:{}", connection.local_host, connection.local_port, connection.remote_host, connection.remote_port),
            ));
        }
        if !start.test_start.protocol.is_empty() {
            lines.push((
                "Test".to_string(),
                format!("{}, {} stream(s), {}s", start.test_start.protocol, start.test_start.num_streams, start.test_start.duration),
            ));
        }

        let end = &result.end;
        lines.push((
            "Sent".to_string(),
            format!("{} at {}", format_bytes(end.sum_sent.bytes), format_bitrate(result.sent_bits_per_second())),
        ));
        let received_bytes = match &end.sum {
            Some(sum) if end.sum_received.bytes == 0 => sum.bytes,
            _ => end.sum_received.bytes,
        };
        lines.push((
            "Received".to_string(),
            format!("{} at {}", format_bytes(received_bytes), format_bitrate(result.received_bits_per_second())),
        ));

        if let Some(retransmits) = end.sum_sent.retransmits {
            lines.push(("Retransmits".to_string(), retransmits.to_string()));
        }
        if let Some(sum) = &end.sum {
            if let (Some(jitter), Some(lost), Some(packets)) = (sum.jitter_ms, sum.lost_packets, sum.packets) {
                lines.push(("Jitter".to_string(), format!("{:.3} ms", jitter)));
                lines.push(("Lost".to_string(), format!("{}/{} ({})", lost, packets, format_percentage(sum.lost_percent.unwrap_or(0.0)))));
            }
        }
        if let Some(reverse) = &end.sum_received_bidir_reverse {
            lines.push(("Reverse".to_string(), format_bitrate(reverse.bits_per_second)));
        }

        let cpu = &end.cpu_utilization_percent;
        if cpu.host_total > 0.0 || cpu.remote_total > 0.0 {
            lines.push((
                "CPU".to_string(),
                format!("local {} / remote {}", format_percentage(cpu.host_total), format_percentage(cpu.remote_total)),
            ));
        }

        if let Some(error) = &result.error {
            lines.push(("Tool error".to_string(), error.clone()));
        }

        lines
    }
}

fn io_err(context: &str) -> impl Fn(std::fmt::Error) -> AppError + '_ {
    move |e| AppError::io(format!("Failed to format {}: {}", context, e))
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(io_err("header"))?;
        writeln!(output, "  {}  ", title).map_err(io_err("header"))?;
        write!(output, "{}", border).map_err(io_err("header"))?;

        Ok(output)
    }

    fn format_iteration(&self, iteration: u32, total: u32) -> Result<String> {
        Ok(format!("Repeat Times: {}/{}", iteration, total))
    }

    fn format_run_outcome(&self, outcome: &RunOutcome) -> Result<String> {
        let mut output = String::new();
        let status = if outcome.cancelled {
            "cancelled".to_string()
        } else {
            format!("exit code {}", outcome.exit_code)
        };

        writeln!(
            output,
            "Run {} ({}): {} after {:.1}s",
            outcome.run_index + 1,
            outcome.role,
            status,
            outcome.duration.as_secs_f64()
        )
        .map_err(io_err("run outcome"))?;

        let count = outcome.reports.len();
        for (index, report) in outcome.reports.iter().enumerate() {
            if count > 1 {
                writeln!(output, "  Report {}/{}:", index + 1, count).map_err(io_err("run outcome"))?;
            }
            match report {
                ReadOutcome::Decoded { result, .. } => {
                    for (label, value) in self.result_lines(result) {
                        writeln!(output, "  {:<12} {}", format!("{}:", label), value).map_err(io_err("run outcome"))?;
                    }
                    if self.options.verbose_mode && !result.intervals.is_empty() {
                        writeln!(output, "{}", self.format_intervals(result)?).map_err(io_err("run outcome"))?;
                    }
                }
                ReadOutcome::Empty => {
                    writeln!(output, "  No report captured").map_err(io_err("run outcome"))?;
                }
                ReadOutcome::Malformed { reason } | ReadOutcome::Undecodable { reason, .. } => {
                    writeln!(output, "  Report could not be decoded: {}", reason).map_err(io_err("run outcome"))?;
                }
            }

            if let Some(artifact) = report.artifact() {
                writeln!(output, "  {:<12} {}", "Saved:", artifact.display()).map_err(io_err("run outcome"))?;
            }
        }

        if self.options.verbose_mode && !outcome.diagnostics.trim().is_empty() {
            writeln!(output, "  stderr:").map_err(io_err("run outcome"))?;
            for line in outcome.diagnostics.lines() {
                writeln!(output, "    {}", line).map_err(io_err("run outcome"))?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    fn format_intervals(&self, result: &MeasurementResult) -> Result<String> {
        let format = TableFormat {
            columns: vec![
                Column::new("Interval", Alignment::Left, 13),
                Column::new("Transfer", Alignment::Right, 9),
                Column::new("Bitrate", Alignment::Right, 14),
                Column::new("Retr", Alignment::Right, 4),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        };

        let rows: Vec<RowData> = result.intervals.iter().map(interval_row).collect();
        Ok(self.create_table(&format, &rows))
    }

    fn format_session_summary(&self, summary: &SessionSummary) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Session Summary:").map_err(io_err("summary"))?;
        writeln!(output, "----------------").map_err(io_err("summary"))?;
        writeln!(output, "Runs:             {}/{}", summary.started_runs, summary.planned_runs).map_err(io_err("summary"))?;
        writeln!(output, "Successful:       {}", summary.successful_runs).map_err(io_err("summary"))?;
        writeln!(output, "Failed:           {}", summary.failed_runs).map_err(io_err("summary"))?;
        writeln!(output, "Success Rate:     {}", format_percentage(summary.success_rate())).map_err(io_err("summary"))?;
        writeln!(output, "Total Duration:   {:.1}s", summary.total_duration.as_secs_f64()).map_err(io_err("summary"))?;

        if let Some(sent) = summary.average_sent_bits_per_second() {
            writeln!(output, "Average Sent:     {}", format_bitrate(sent)).map_err(io_err("summary"))?;
        }
        if let Some(received) = summary.average_received_bits_per_second() {
            writeln!(output, "Average Received: {}", format_bitrate(received)).map_err(io_err("summary"))?;
        }
        if summary.cancelled {
            writeln!(output, "Stopped early by shutdown request").map_err(io_err("summary"))?;
        }
        if let Some(error) = &summary.start_error {
            writeln!(output, "Start failure:    {}", error).map_err(io_err("summary"))?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_resource_usage(&self, role: Role, usage: &ResourceUsage) -> Result<String> {
        Ok(format!("[{}] {}", role, usage))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

fn interval_row(interval: &IntervalSection) -> RowData {
    let sum = &interval.sum;
    let mut span = format!("{:.2}-{:.2} sec", sum.start, sum.end);
    if sum.omitted {
        span.push_str(" (omitted)");
    }
    vec![
        span,
        format_bytes(sum.bytes),
        format_bitrate(sum.bits_per_second),
        sum.retransmits.map_or_else(|| "-".to_string(), |r| r.to_string()),
    ]
}

fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
    }
}

/// Binary-prefixed byte count: `512B`, `1.5KB`, `3.2GB`
pub fn format_bytes(size: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if size < 1024 {
        return format!("{}B", size);
    }

    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

/// Decimal-prefixed bitrate the way iperf3 prints it: `941.2 Mbits/sec`
pub fn format_bitrate(bits_per_second: f64) -> String {
    const UNITS: [&str; 5] = ["bits/sec", "Kbits/sec", "Mbits/sec", "Gbits/sec", "Tbits/sec"];

    let mut value = bits_per_second.max(0.0);
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Format percentage with appropriate precision
pub fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use std::time::Duration;

    const REPORT: &str = r#"{
        "start": {"connected": [{"local_host": "10.0.0.1", "local_port": 40000, "remote_host": "10.0.0.2", "remote_port": 5201}],
                  "test_start": {"protocol": "TCP", "num_streams": 2, "duration": 10}},
        "intervals": [
            {"sum": {"start": 0, "end": 1, "bytes": 117964800, "bits_per_second": 943718400, "retransmits": 3, "omitted": false}},
            {"sum": {"start": 1, "end": 2, "bytes": 118000000, "bits_per_second": 944000000, "retransmits": 0, "omitted": true}}
        ],
        "end": {"sum_sent": {"bytes": 1179648000, "bits_per_second": 943718400, "retransmits": 12},
                "sum_received": {"bytes": 1178000000, "bits_per_second": 942400000},
                "cpu_utilization_percent": {"host_total": 12.5, "remote_total": 4.0}}
    }"#;

    fn formatter(verbose: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: verbose,
            table_borders: true,
        })
    }

    fn decoded_outcome() -> RunOutcome {
        let result: MeasurementResult = serde_json::from_str(REPORT).unwrap();
        RunOutcome {
            role: Role::Client,
            run_index: 1,
            exit_code: 0,
            cancelled: false,
            duration: Duration::from_millis(10_300),
            reports: vec![ReadOutcome::Decoded {
                result: Box::new(result),
                canonical: String::new(),
                artifact: Some("/tmp/iperf3_2026-10-19T10-00-00.json".into()),
            }],
            diagnostics: "warning: something\n".to_string(),
            capture_error: None,
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1023), "1023B");
        assert_eq!(format_bytes(1536), "1.5KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0GB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024 * 1024), "2.0TB");
    }

    #[test]
    fn test_format_bitrate() {
        assert_eq!(format_bitrate(0.0), "0 bits/sec");
        assert_eq!(format_bitrate(999.0), "999 bits/sec");
        assert_eq!(format_bitrate(1_500.0), "1.5 Kbits/sec");
        assert_eq!(format_bitrate(941_200_000.0), "941.2 Mbits/sec");
        assert_eq!(format_bitrate(9_400_000_000.0), "9.4 Gbits/sec");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(100.0), "100.0%");
        assert_eq!(format_percentage(0.01), "0.0%");
        assert_eq!(format_percentage(66.666), "66.7%");
    }

    #[test]
    fn test_iteration_line() {
        assert_eq!(formatter(false).format_iteration(2, 5).unwrap(), "Repeat Times: 2/5");
    }

    #[test]
    fn test_run_outcome_summary() {
        let text = formatter(false).format_run_outcome(&decoded_outcome()).unwrap();

        assert!(text.starts_with("Run 2 (client): exit code 0 after 10.3s"));
        assert!(text.contains("10.0.0.1:40000 -> 10.0.0.2:5201"));
        assert!(text.contains("TCP, 2 stream(s), 10s"));
        assert!(text.contains("943.7 Mbits/sec"));
        assert!(text.contains("Retransmits: 12"));
        assert!(text.contains("iperf3_2026-10-19T10-00-00.json"));
        assert!(!text.contains("Interval"));
        assert!(!text.contains("stderr"));
    }

    #[test]
    fn test_verbose_outcome_has_intervals_and_stderr() {
        let text = formatter(true).format_run_outcome(&decoded_outcome()).unwrap();
        assert!(text.contains("| Interval"));
        assert!(text.contains("(omitted)"));
        assert!(text.contains("warning: something"));
    }

    #[test]
    fn test_undecoded_outcome() {
        let mut outcome = decoded_outcome();
        outcome.cancelled = true;
        outcome.reports = vec![ReadOutcome::Malformed { reason: "expected value at line 1".to_string() }];

        let text = formatter(false).format_run_outcome(&outcome).unwrap();
        assert!(text.contains("cancelled"));
        assert!(text.contains("could not be decoded: expected value"));
    }

    #[test]
    fn test_server_outcome_lists_every_report() {
        let mut outcome = decoded_outcome();
        outcome.role = Role::Server;
        let second = outcome.reports[0].clone();
        outcome.reports.push(second);

        let text = formatter(false).format_run_outcome(&outcome).unwrap();
        assert!(text.contains("Report 1/2:"));
        assert!(text.contains("Report 2/2:"));
        assert_eq!(text.matches("Saved:").count(), 2);
        assert!(!formatter(false).format_run_outcome(&decoded_outcome()).unwrap().contains("Report 1/1"));
    }

    #[test]
    fn test_interval_table_layout() {
        let result: MeasurementResult = serde_json::from_str(REPORT).unwrap();
        let table = formatter(false).format_intervals(&result).unwrap();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("+---"));
        assert!(lines[3].contains("0.00-1.00 sec"));
        assert!(lines[3].ends_with("|    3 |"));
        assert!(lines[4].contains("(omitted)"));
    }

    #[test]
    fn test_resource_usage_line() {
        let usage = ResourceUsage { cpu_percent: 7.0, memory_percent: 55.123 };
        let line = formatter(false).format_resource_usage(Role::Client, &usage).unwrap();
        assert_eq!(line, "[client] CPU: 7.00% MEM: 55.12%");
    }

    #[test]
    fn test_header() {
        let header = formatter(false).format_header("iperf3").unwrap();
        assert_eq!(header, "==========\n  iperf3  \n==========");
    }
}
