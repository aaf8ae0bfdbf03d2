//! pagevault - ingest scanned PDF registers into a searchable page library.

mod cli;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use cli::{Cli, LogFormat};
use error::CliError;

fn init_logging(format: LogFormat, verbose: u8) -> Result<(), CliError> {
    let default_filter = match verbose {
        0 => "pagevault=info",
        1 => "pagevault=debug",
        _ => "pagevault=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let (text, json) = match format {
        LogFormat::Text => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json);

    // The db layer logs through the `log` facade.
    tracing_log::LogTracer::init().map_err(|e| CliError::Logging(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CliError::Logging(e.to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_format, cli.verbose) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match cli::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
