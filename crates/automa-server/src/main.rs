use automa_core::AutomaConfig;
use clap::Parser;

mod app;
mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "automa_server=info,automa_scheduler=info,automa_sandbox=info,automa_store=info"
                    .into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // --config > AUTOMA_CONFIG > ~/.automa/automa.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("AUTOMA_CONFIG").ok());
    let config = AutomaConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        AutomaConfig::default()
    });

    let app = app::App::build(&config)?;

    match cli.command {
        Command::Serve => commands::serve(&app).await,
        Command::Script { action } => commands::script(&app, action),
        Command::Job { action } => commands::job(&app, action).await,
    }
}
