//! stack-teardown: dependency-ordered teardown of a deployed cloud stack
//!
//! Discovers the resources tagged with a stack name, shows the deletion
//! plan, and deletes them in dependency order once confirmed.

use anyhow::{Context, Result};
use clap::Parser;
use stack_teardown::aws::{AwsCloudApi, AwsContext, FromAwsContext};
use stack_teardown::cli::Args;
use stack_teardown::config::{OutputFormat, TeardownConfig};
use stack_teardown::orchestrator::{TeardownEvent, TeardownOrchestrator};
use stack_teardown::report::{EXIT_FAILURES, EXIT_INVALID};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Crates whose logs are capped at `warn`
const NOISY_TARGETS: &[&str] = &["aws_config", "aws_sdk", "aws_smithy", "hyper"];

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e);
            std::process::exit(EXIT_INVALID);
        }
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter = NOISY_TARGETS
        .iter()
        .filter_map(|target| format!("{target}=warn").parse::<Directive>().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            EnvFilter::add_directive,
        );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel on the first Ctrl-C; exit on the second
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupted, finishing in-flight deletions (Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(EXIT_FAILURES);
        }
    });
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<TeardownEvent>) {
    while let Some(event) = rx.recv().await {
        if let Some(line) = event.progress_line() {
            eprintln!("{line}");
        }
    }
}

async fn run() -> Result<i32> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config: TeardownConfig = args.into();
    config.validate().context("Invalid arguments")?;

    if let Some(profile) = &config.aws.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }
    info!(region = %config.aws.region, "Loading AWS configuration");
    let aws = AwsContext::with_profile(&config.aws.region, config.aws.aws_profile.as_deref()).await;
    let api = AwsCloudApi::from_context(&aws);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(print_progress(rx));

    let orchestrator = TeardownOrchestrator::new(&api, config.orchestrator_config())
        .with_cancel(cancel)
        .with_events(tx);
    let result = orchestrator.run(&config.scope.selector, config.flags.mode).await;

    // Closes the event channel so the printer drains and stops
    drop(orchestrator);
    let _ = progress.await;

    let report = result.context("Teardown aborted")?;
    match config.flags.format {
        OutputFormat::Table => println!("{report}"),
        OutputFormat::Json => println!(
            "{}",
            report.to_json().context("Failed to serialize report")?
        ),
    }
    Ok(report.exit_code())
}
