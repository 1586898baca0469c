//! revwiki-server: HTTP API over the revision store.

use anyhow::Result;
use clap::Parser;

use revwiki_server::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    revwiki_server::run_with_cli(cli).await
}
