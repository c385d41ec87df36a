use crate::cli::Cli;
use crate::error::LeaderboardResult;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

const TRACE_LEVELS: [&'static str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
const LOCAL_SETTINGS_YAML_FILE: &str = ".env.local.yaml";

// All settings may be configured via environment variables. Example:
// FEED_BASE_URL="http://localhost:8080" would set feed_base_url to that value.
// CLI flags take precedence over both the local yaml file and the environment.
#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_trace_level")]
    trace_level: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,
    #[serde(default = "default_feed_user_agent")]
    pub feed_user_agent: String,
    #[serde(default = "default_feed_timeout_sec")]
    pub feed_timeout_sec: u64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    // Posts older than this are considered stale and refetched on load
    #[serde(default = "default_cache_duration_ms")]
    pub cache_duration_ms: u64,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    // When set, posts are read from another instance's proxy endpoint
    pub posts_source_url: Option<String>,
}

impl Settings {
    pub fn new(cli: Cli) -> LeaderboardResult<Self> {
        let mut figment = Figment::new();
        if Path::new(LOCAL_SETTINGS_YAML_FILE).exists() {
            println!(
                "\n######################################\n\
                   ##   Found '.env.local.yaml' file,  ##\n\
                   ##   loading local configuration.   ##\n\
                   ######################################\n\
                "
            );
            figment = figment.merge(Yaml::file(LOCAL_SETTINGS_YAML_FILE));
        }
        let figment = figment.merge(Env::raw()).merge(Serialized::defaults(cli));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> LeaderboardResult<Self> {
        Ok(figment.extract()?)
    }

    pub fn get_trace_level(&self) -> Level {
        get_trace_level(&self.trace_level)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_sec)
    }

    pub fn cache_duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.cache_duration_ms as i64)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

fn get_trace_level(level_str: &str) -> Level {
    match level_str {
        level if level == TRACE_LEVELS[0] => Level::TRACE,
        level if level == TRACE_LEVELS[1] => Level::DEBUG,
        level if level == TRACE_LEVELS[2] => Level::INFO,
        level if level == TRACE_LEVELS[3] => Level::WARN,
        level if level == TRACE_LEVELS[4] => Level::ERROR,
        // Default trace level
        _ => Level::INFO,
    }
}

fn default_trace_level() -> String {
    "INFO".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_feed_base_url() -> String {
    "https://shiba.hackclub.com".to_string()
}

fn default_feed_user_agent() -> String {
    "ShomatoLeaderboard/1.0".to_string()
}

fn default_feed_timeout_sec() -> u64 {
    10
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_cache_duration_ms() -> u64 {
    10 * 60 * 1000
}

fn default_update_interval_ms() -> u64 {
    10 * 60 * 1000
}
