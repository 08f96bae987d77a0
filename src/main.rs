use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use popbench::bench::monitor::factory_from_settings;
use popbench::bench::{report, run_benchmark};
use popbench::broker::LoopbackConnector;
use popbench::cli::Cli;
use popbench::config::{Settings, load_config};
use popbench::transport::{Connector, WsConnector, tls};
use popbench::utils::{BenchError, logging};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut settings);
    logging::init(logging::level_for(settings.output.quiet));

    match run(settings).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<String, BenchError> {
    settings.validate()?;

    if settings.broker.url.starts_with("memory://") {
        return run_with(&settings, LoopbackConnector::default()).await;
    }
    let tls = tls::from_settings(&settings.broker)?;
    run_with(&settings, WsConnector::new(tls)).await
}

async fn run_with<C: Connector>(settings: &Settings, connector: C) -> Result<String, BenchError> {
    let monitors = factory_from_settings(settings);
    let report = run_benchmark(settings, Arc::new(connector), monitors).await?;
    report::render(&report, settings.output.format)
}
