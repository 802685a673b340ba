//! amtctl - Intel AMT power control
//!
//! This is the main entry point for the amtctl CLI.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use amtctl::amt::{AmtPower, PowerState, SetOptions, SetOutcome};
use amtctl::config::{Config, Overrides};
use anyhow::{Context, Result};
use cli::output::{Printer, ProgressObserver};
use cli::{Cli, Commands, SetArgs, EXIT_ERROR, EXIT_OK, EXIT_TIMEOUT};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    if cli.no_color {
        colored::control::set_override(false);
    }
    let printer = Printer::new(cli.output, !cli.no_color);

    let exit_code = match run(&cli, &printer).await {
        Ok(code) => code,
        Err(e) => {
            printer.error(&e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 3),
        )
        .with(env_filter)
        .init();
}

async fn run(cli: &Cli, printer: &Printer) -> Result<i32> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let overrides = Overrides {
        username: cli.username.clone(),
        password: cli.password.clone(),
        insecure: cli.insecure,
    };

    match &cli.command {
        Commands::Status(args) => {
            let connection = config.resolve(&args.host, &overrides)?;
            let mut power = AmtPower::new(connection)?;
            let observed = power
                .get_power_state()
                .await
                .with_context(|| format!("failed to query {}", args.host))?;
            printer.status(&args.host, observed);
            Ok(EXIT_OK)
        }
        Commands::Set(args) => set(cli, printer, &config, &overrides, args).await,
    }
}

async fn set(
    cli: &Cli,
    printer: &Printer,
    config: &Config,
    overrides: &Overrides,
    args: &SetArgs,
) -> Result<i32> {
    // Reject bad names before resolving the host.
    let target: PowerState = args.state.parse()?;
    let connection = config.resolve(&args.host, overrides)?;

    let mut power = AmtPower::new(connection)?;
    if args.wait && !cli.is_json() {
        power = power.with_observer(Arc::new(ProgressObserver::new(!cli.no_color)));
    }

    let cancel = CancellationToken::new();
    let mut options = SetOptions::new();
    if args.wait {
        options = SetOptions::wait(Duration::from_secs(args.timeout))
            .with_poll_interval(Duration::from_secs(args.poll_interval.max(1)))
            .with_cancel(cancel.clone());

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupted, cancelling wait");
                cancel.cancel();
            }
        });
    }

    let start = Instant::now();
    let outcome = power
        .set_power_state(target, &options)
        .await
        .with_context(|| format!("failed to set {} to {}", args.host, target))?;
    printer.set(&args.host, target, &outcome, start.elapsed());

    Ok(match outcome {
        SetOutcome::TimedOut { .. } => EXIT_TIMEOUT,
        SetOutcome::Requested | SetOutcome::Confirmed(_) => EXIT_OK,
    })
}
