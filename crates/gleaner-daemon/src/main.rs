use clap::Parser;
use tracing::warn;

mod app;
mod cli;
mod commands;
mod export;
mod source;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gleaner=info,gleaner_scheduler=info,gleaner_collector=info,gleaner_ledger=warn"
                    .into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // cron helpers need neither config nor database
    if let Commands::Cron(command) = cli.command {
        return commands::cron(command);
    }

    // config: --config > GLEANER_CONFIG env > ~/.gleaner/gleaner.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("GLEANER_CONFIG").ok());
    let config = gleaner_core::GleanerConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        gleaner_core::GleanerConfig::default()
    });

    let app = app::App::open(config)?;
    match cli.command {
        Commands::Serve => commands::serve(&app).await,
        Commands::Job(command) => commands::job(&app, command).await,
        Commands::Runs(args) => commands::runs(&app, args),
        Commands::Cron(command) => commands::cron(command),
    }
}
