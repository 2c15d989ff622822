//! SourceChat CLI: ask questions grounded in a PDF, a web page, or nothing
//! at all, with optional spoken answers.

mod commands;
mod session;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
