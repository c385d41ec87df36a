use clap::Parser;
use serde::Serialize;

#[derive(Debug, Default, Parser, Serialize)]
#[command(name = "shomato", about = "Shomato seeds leaderboard server")]
pub struct Cli {
    /// Port the HTTP server listens on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Directory holding the persisted posts cache
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    /// Read posts through another instance's /api/posts endpoint instead of the upstream feed
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts_source_url: Option<String>,
}
