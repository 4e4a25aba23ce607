use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.root)?;

    match cli.command {
        Commands::Password { serial } => commands::password(&serial),
        Commands::Inspect { dump, pages } => commands::inspect(&dump, pages).await,
        Commands::Simulate {
            figure,
            serial,
            fail_at,
            size_byte,
        } => {
            let passed =
                commands::simulate(config, figure.as_deref(), &serial, fail_at, &size_byte).await?;
            std::process::exit(if passed { 0 } else { 1 });
        }
    }
}
