use clap::Parser;
use std::path::PathBuf;

mod commands;

use commands::Commands;

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Authenticated remote management agent for a single host", long_about = None)]
#[command(version)]
struct Cli {
    /// Env file to load settings from and persist changes into
    #[arg(long, global = true, env = "ENV_FILE")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let command = cli.command.unwrap_or_default();
    command.execute(cli.env_file).await
}
