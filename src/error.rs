use std::error::Error;
use std::fmt;
use tokio_cron_scheduler::JobSchedulerError;

/// Custom Error and Result types to unify errors from all sources.
pub type LeaderboardResult<T> = Result<T, LeaderboardError>;

#[derive(Debug)]
pub enum LeaderboardError {
    /// Non-success status returned by the posts feed.
    UpstreamHttp(u16),
    Network(String),
    Storage(String),
    Parse(String),
    Scheduler(String),
    Config(String),
}

impl fmt::Display for LeaderboardError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LeaderboardError::UpstreamHttp(status) => write!(f, "HTTP error! status: {}", status),
            LeaderboardError::Network(s) => write!(f, "Network Error: {}", s),
            LeaderboardError::Storage(s) => write!(f, "Storage Error: {}", s),
            LeaderboardError::Parse(s) => write!(f, "Parse Error: {}", s),
            LeaderboardError::Scheduler(s) => write!(f, "Scheduler Error: {}", s),
            LeaderboardError::Config(s) => write!(f, "Config Error: {}", s),
        }
    }
}

impl Error for LeaderboardError {}

impl From<reqwest::Error> for LeaderboardError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return LeaderboardError::Parse(error.to_string());
        }
        match error.status() {
            Some(status) => LeaderboardError::UpstreamHttp(status.as_u16()),
            None => LeaderboardError::Network(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for LeaderboardError {
    fn from(error: serde_json::Error) -> Self {
        LeaderboardError::Parse(error.to_string())
    }
}

impl From<std::io::Error> for LeaderboardError {
    fn from(error: std::io::Error) -> Self {
        LeaderboardError::Storage(error.to_string())
    }
}

impl From<JobSchedulerError> for LeaderboardError {
    fn from(error: JobSchedulerError) -> Self {
        LeaderboardError::Scheduler(error.to_string())
    }
}

impl From<figment::Error> for LeaderboardError {
    fn from(error: figment::Error) -> Self {
        LeaderboardError::Config(error.to_string())
    }
}
