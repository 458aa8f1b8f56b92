//! Progress and result reporting for runs and repeat sequences

use crate::executor::SessionSummary;
use crate::models::Config;
use crate::output::{OutputFormatter, OutputFormatterFactory};
use crate::process::RunOutcome;
use crate::resources::ResourceUsage;
use crate::types::Role;
use async_trait::async_trait;

/// Receiver of progress events from the run controller and supervisor
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Called before run `iteration` (1-based) of `total` is started
    async fn iteration_started(&self, iteration: u32, total: u32);

    /// Called once per run after its output has been reduced
    async fn run_finished(&self, outcome: &RunOutcome);

    async fn session_finished(&self, summary: &SessionSummary);

    /// Periodic host load while a `role` process is running
    async fn resource_usage(&self, role: Role, usage: &ResourceUsage);

    async fn notice(&self, text: &str);

    async fn warning(&self, text: &str);
}

/// Prints status to the terminal
pub struct ConsoleReporter {
    formatter: Box<dyn OutputFormatter>,
}

impl ConsoleReporter {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(OutputFormatterFactory::create_formatter(config.enable_color, config.verbose))
    }

    fn emit(&self, rendered: crate::Result<String>) {
        match rendered {
            Ok(text) if !text.is_empty() => println!("{}", text),
            Ok(_) => {}
            Err(e) => eprintln!("{}", e.format_for_console(false)),
        }
    }
}

#[async_trait]
impl StatusReporter for ConsoleReporter {
    async fn iteration_started(&self, iteration: u32, total: u32) {
        self.emit(self.formatter.format_iteration(iteration, total));
    }

    async fn run_finished(&self, outcome: &RunOutcome) {
        self.emit(self.formatter.format_run_outcome(outcome));
        println!();
    }

    async fn session_finished(&self, summary: &SessionSummary) {
        self.emit(self.formatter.format_session_summary(summary));
    }

    async fn resource_usage(&self, role: Role, usage: &ResourceUsage) {
        self.emit(self.formatter.format_resource_usage(role, usage));
    }

    async fn notice(&self, text: &str) {
        self.emit(self.formatter.format_success(text));
    }

    async fn warning(&self, text: &str) {
        self.emit(self.formatter.format_warning(text));
    }
}
