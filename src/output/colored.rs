//! Colored formatter implementation with terminal color support

use super::formatter::{
    format_bitrate, format_percentage, FormattingOptions, OutputFormatter, PlainFormatter,
};
use crate::{
    error::Result,
    executor::SessionSummary,
    models::MeasurementResult,
    process::RunOutcome,
    report::ReadOutcome,
    resources::ResourceUsage,
    types::Role,
};
use colored::*;
use std::fmt::Write as _;

/// Colors used for the different kinds of output
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub label: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::BrightCyan,
            label: Color::BrightWhite,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Blue,
        }
    }
}

/// Formatter that decorates plain output with ANSI colors
pub struct ColoredFormatter {
    plain: PlainFormatter,
    colors: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            plain: PlainFormatter::new(options),
            colors: ColorScheme::default(),
        }
    }

    pub fn with_colors(mut self, colors: ColorScheme) -> Self {
        self.colors = colors;
        self
    }

    fn status_color(&self, outcome: &RunOutcome) -> Color {
        if outcome.cancelled {
            self.colors.warning
        } else if outcome.succeeded() {
            self.colors.success
        } else {
            self.colors.error
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        Ok(self.plain.format_header(title)?.color(self.colors.header).bold().to_string())
    }

    fn format_iteration(&self, iteration: u32, total: u32) -> Result<String> {
        Ok(format!(
            "{} {}",
            "Repeat Times:".color(self.colors.info).bold(),
            format!("{}/{}", iteration, total).bold()
        ))
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
            "{} {}",
            format!("Run {} ({}):", outcome.run_index + 1, outcome.role).bold(),
            format!("{} after {:.1}s", status, outcome.duration.as_secs_f64()).color(self.status_color(outcome))
        )?;

        let count = outcome.reports.len();
        for (index, report) in outcome.reports.iter().enumerate() {
            if count > 1 {
                writeln!(output, "  {}", format!("Report {}/{}:", index + 1, count).color(self.colors.header))?;
            }
            match report {
                ReadOutcome::Decoded { result, .. } => {
                    for (label, value) in self.plain.result_lines(result) {
                        let value = if label == "Tool error" { value.red().to_string() } else { value };
                        writeln!(output, "  {} {}", format!("{:<12}", format!("{}:", label)).color(self.colors.label), value)?;
                    }
                    if self.plain.options().verbose_mode && !result.intervals.is_empty() {
                        writeln!(output, "{}", self.format_intervals(result)?)?;
                    }
                }
                ReadOutcome::Empty => {
                    writeln!(output, "  {}", "No report captured".color(self.colors.warning))?;
                }
                ReadOutcome::Malformed { reason } | ReadOutcome::Undecodable { reason, .. } => {
                    writeln!(output, "  {}", format!("Report could not be decoded: {}", reason).color(self.colors.warning))?;
                }
            }

            if let Some(artifact) = report.artifact() {
                writeln!(output, "  {} {}", format!("{:<12}", "Saved:").color(self.colors.label), artifact.display().to_string().dimmed())?;
            }
        }

        if self.plain.options().verbose_mode && !outcome.diagnostics.trim().is_empty() {
            writeln!(output, "  {}", "stderr:".color(self.colors.warning))?;
            for line in outcome.diagnostics.lines() {
                writeln!(output, "    {}", line.dimmed())?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    fn format_intervals(&self, result: &MeasurementResult) -> Result<String> {
        // Color whole rows after layout so escape codes never skew widths
        let table = self.plain.format_intervals(result)?;
        Ok(table
            .lines()
            .map(|line| {
                if line.contains("(omitted)") {
                    line.dimmed().to_string()
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn format_session_summary(&self, summary: &SessionSummary) -> Result<String> {
        let mut output = String::new();
        let rate = summary.success_rate();
        let rate_color = if rate >= 99.95 {
            self.colors.success
        } else if rate > 0.0 {
            self.colors.warning
        } else {
            self.colors.error
        };

        writeln!(output, "{}", "Session Summary:".color(self.colors.header).bold())?;
        writeln!(output, "{}", "----------------".color(self.colors.header))?;
        writeln!(output, "Runs:             {}/{}", summary.started_runs, summary.planned_runs)?;
        writeln!(output, "Successful:       {}", summary.successful_runs.to_string().color(self.colors.success))?;
        writeln!(output, "Failed:           {}", summary.failed_runs.to_string().color(if summary.failed_runs > 0 { self.colors.error } else { self.colors.success }))?;
        writeln!(output, "Success Rate:     {}", format_percentage(rate).color(rate_color).bold())?;
        writeln!(output, "Total Duration:   {:.1}s", summary.total_duration.as_secs_f64())?;

        if let Some(sent) = summary.average_sent_bits_per_second() {
            writeln!(output, "Average Sent:     {}", format_bitrate(sent).bold())?;
        }
        if let Some(received) = summary.average_received_bits_per_second() {
            writeln!(output, "Average Received: {}", format_bitrate(received).bold())?;
        }
        if summary.cancelled {
            writeln!(output, "{}", "Stopped early by shutdown request".color(self.colors.warning))?;
        }
        if let Some(error) = &summary.start_error {
            writeln!(output, "Start failure:    {}", error.to_string().color(self.colors.error))?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_resource_usage(&self, role: Role, usage: &ResourceUsage) -> Result<String> {
        Ok(format!("{} {}", format!("[{}]", role).color(self.colors.info), usage.to_string().dimmed()))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", "✗".color(self.colors.error).bold(), error.color(self.colors.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", "!".color(self.colors.warning).bold(), warning.color(self.colors.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", "✓".color(self.colors.success).bold(), message.color(self.colors.success)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> ColoredFormatter {
        ColoredFormatter::new(FormattingOptions::default())
    }

    #[test]
    fn test_iteration_keeps_text() {
        let line = formatter().format_iteration(1, 3).unwrap();
        assert!(line.contains("Repeat Times:"));
        assert!(line.contains("1/3"));
    }

    #[test]
    fn test_messages_include_text() {
        let fmt = formatter();
        assert!(fmt.format_error("boom").unwrap().contains("boom"));
        assert!(fmt.format_warning("careful").unwrap().contains("careful"));
        assert!(fmt.format_success("done").unwrap().contains("done"));
    }

    #[test]
    fn test_resource_usage_keeps_text() {
        let usage = ResourceUsage { cpu_percent: 1.0, memory_percent: 2.0 };
        let line = formatter().format_resource_usage(Role::Server, &usage).unwrap();
        assert!(line.contains("[server]"));
        assert!(line.contains("CPU: 1.00% MEM: 2.00%"));
    }

    #[test]
    fn test_custom_scheme() {
        let scheme = ColorScheme {
            error: Color::Magenta,
            ..ColorScheme::default()
        };
        let fmt = formatter().with_colors(scheme);
        assert_eq!(fmt.colors.error, Color::Magenta);
    }
}
