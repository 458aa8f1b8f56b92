//! iperf3 Runner - Main CLI Application
//!
//! Runs iperf3 as a server, or as a client for a number of repeated
//! measurements, and keeps every JSON report it produces.

use clap::Parser;
use iperf3_runner::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, ValidationLevel},
    error::{AppError, Result},
    executor::{RunController, SessionSummary},
    log_info,
    logging::LoggerFactory,
    models::Config,
    process::ProcessSupervisor,
    resources::ResourceMonitor,
    status::{ConsoleReporter, StatusReporter},
    types::Role,
    BUILD_TIME, GIT_COMMIT, PKG_NAME, TARGET_TRIPLE, VERSION,
};
use std::process;
use std::sync::Arc;

/// Exit code used when the user interrupted the run
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(1);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    let use_color = cli.use_colors();
    match run_application(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}", e.format_for_console(use_color));
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Main application logic; returns the process exit code
async fn run_application(cli: Cli) -> Result<i32> {
    if cli.debug {
        eprintln!("{} v{} ({}, built {}, {})", PKG_NAME, VERSION, GIT_COMMIT, BUILD_TIME, TARGET_TRIPLE);
        eprintln!("Debug mode enabled");
    }

    let role = cli.role();
    let show_config = cli.show_config;
    let config = load_config(cli)?;

    if show_config || config.debug {
        println!("{}", display_config_summary(&config, role));
        println!();
        if show_config {
            return Ok(0);
        }
    }

    for warning in validate_config(&config)? {
        if warning.level != ValidationLevel::Info || config.verbose {
            eprintln!("{}", warning.format(config.enable_color));
        }
    }

    let factory = LoggerFactory::new(config.clone());
    let logger = factory.create_logger("MAIN").await;
    log_info!(logger, "Starting {} v{} in {} mode", PKG_NAME, VERSION, role);

    let supervisor = Arc::new(ProcessSupervisor::new(
        config.binary_path.clone(),
        factory.create_process_logger().await,
    ));
    let reporter: Arc<dyn StatusReporter> = Arc::new(ConsoleReporter::from_config(&config));
    let monitor = ResourceMonitor::from_config(&config, Arc::clone(&reporter));

    match role {
        Role::Client => {
            let mut controller = RunController::new(supervisor, reporter, factory.create_logger("RUN").await);
            if let Some(monitor) = monitor {
                controller = controller.with_resource_monitor(monitor);
            }
            run_client(&controller, &config).await
        }
        Role::Server => run_server(&supervisor, reporter.as_ref(), monitor.as_ref(), &config).await,
    }
}

async fn run_client(controller: &RunController, config: &Config) -> Result<i32> {
    let signal = controller.shutdown_signal();
    let supervisor = Arc::clone(controller.supervisor());
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping iperf3...");
            signal.request();
            supervisor.shutdown(Role::Client).await;
        }
    });

    let summary = controller.run(config).await;
    interrupt.abort();

    let mut summary = summary?;
    if let Some(e) = summary.start_error.take() {
        return Err(e);
    }
    Ok(client_exit_code(&summary))
}

fn client_exit_code(summary: &SessionSummary) -> i32 {
    if summary.cancelled {
        return EXIT_INTERRUPTED;
    }
    summary
        .outcomes
        .iter()
        .find_map(|outcome| outcome.error())
        .map_or(0, |e| e.exit_code())
}

async fn run_server(
    supervisor: &ProcessSupervisor,
    reporter: &dyn StatusReporter,
    monitor: Option<&ResourceMonitor>,
    config: &Config,
) -> Result<i32> {
    let handle = supervisor.start_with_config(config, Role::Server, 0).await?;
    let usage = monitor.map(|monitor| monitor.spawn(handle.clone()));
    let bind = if config.server.listen_address.is_empty() { "*" } else { &config.server.listen_address };
    reporter
        .notice(&format!("iperf3 server listening on {}:{} (Ctrl-C to stop)", bind, config.server.port))
        .await;

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome?,
        _ = tokio::signal::ctrl_c() => {
            handle.shutdown().await;
            handle.wait().await?
        }
    };
    if let Some(task) = usage {
        let _ = task.await;
    }
    reporter.run_finished(&outcome).await;

    if outcome.cancelled {
        return Ok(EXIT_INTERRUPTED);
    }
    Ok(outcome.error().map_or(0, |e| e.exit_code()))
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    let message = error.user_friendly_message();
    if let Some((_, suggestion)) = message.split_once("\n\n") {
        eprintln!("{}", suggestion);
    }

    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your config file, .env file and command line arguments");
            eprintln!("  - Output directories must already exist");
            eprintln!("  - --reverse and --bidir cannot be combined");
        }
        AppError::Spawn { .. } => {
            eprintln!();
            eprintln!("Launch troubleshooting:");
            eprintln!("  - Install iperf3 or pass its location with --binary");
            eprintln!("  - Set IPERF3_BINARY in the environment or .env file");
            eprintln!("  - Check that the file is executable");
        }
        AppError::Capture(_) | AppError::Io(_) => {
            eprintln!();
            eprintln!("File troubleshooting:");
            eprintln!("  - Check free space and permissions of the temporary directory");
        }
        _ => {}
    }
}
