mod config;
mod directory;
mod flights;
mod geo;
mod location;
mod map;
mod models;
mod nearest;
mod pipeline;

use std::error::Error;
use std::io;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(&config);

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> Result<(), Box<dyn Error>> {
    let client = config.http_client()?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    let user = pipeline::locate(config, &client, &mut input, &mut out).await?;
    let report = pipeline::run(config, &client, &user, &mut out).await?;
    info!(
        airport = %report.airport.name,
        distance_km = report.distance_km,
        flight = report.flight.is_some(),
        map = report.map_rendered,
        "run complete"
    );

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
