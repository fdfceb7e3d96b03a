mod api;
mod charts;
mod cli;
mod db;
mod error;
mod models;
mod scheduler;

use clap::Parser;
use cli::{App, Cli};
use colored::*;
use error::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging: stdout plus a non-blocking log file next to the
    // binary. The guard must live until exit so buffered lines get flushed.
    let file_appender = tracing_appender::rolling::never(".", "weatherlog.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    let cli = Cli::parse();

    info!("Initializing weatherlog...");

    // Initialize the application state (configuration, DB connection)
    let app = match App::new().await {
        Ok(app) => {
            info!("Application initialized successfully.");
            app
        },
        Err(e) => {
            error!("Failed to initialize application: {:?}", e);
            println!(
                "{}",
                "Error: Failed to initialize application. Check logs.".red()
            );
            return Err(e);
        },
    };

    if let Err(e) = app.run(cli).await {
        error!("Command execution failed: {:?}", e);
        println!(
            "{} {}",
            "Error executing command:".red(),
            e.to_string().red()
        );
        return Err(e);
    }

    Ok(())
}
