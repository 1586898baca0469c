use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// CLI for the revwiki HTTP server.
#[derive(Debug, Clone, Parser)]
#[command(name = "revwiki-server", about = "HTTP server for the revwiki revision store")]
pub struct Cli {
    /// Path to revwiki.yml
    #[arg(long, env = "REVWIKI_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Listen address for the HTTP API (overrides server.listen_addr)
    #[arg(long, env = "REVWIKI_ADDR")]
    pub listen_addr: Option<SocketAddr>,

    /// Directory for document files; switches storage to the file backend
    #[arg(long, env = "REVWIKI_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

pub const DEFAULT_CONFIG: &str = "revwiki.yml";
