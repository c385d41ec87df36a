use async_trait::async_trait;
use reqwest::{header::USER_AGENT, Client};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::Settings;
use crate::error::{LeaderboardError, LeaderboardResult};
use crate::feed::models::Post;

/// Anything the posts cache can pull a fresh collection of posts from.
#[async_trait]
pub trait PostsSource: Send + Sync {
    /// Feed payload exactly as served.
    async fn fetch_feed(&self) -> LeaderboardResult<Value>;

    async fn fetch_posts(&self) -> LeaderboardResult<Vec<Post>> {
        let feed = self.fetch_feed().await?;
        let posts: Vec<Post> = serde_json::from_value(feed)?;
        debug!("Decoded {} posts.", posts.len());
        Ok(posts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    // Upstream feed listing every post
    AllPosts,
    // Same payload re-served by a leaderboard instance
    ProxyPosts,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Endpoint::AllPosts => write!(f, "/api/GetAllPosts"),
            Endpoint::ProxyPosts => write!(f, "/api/posts"),
        }
    }
}

pub struct FeedClient {
    http_client: Client,
    base_url: String,
    user_agent: String,
    endpoint: Endpoint,
}

impl FeedClient {
    fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
        endpoint: Endpoint,
    ) -> LeaderboardResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            endpoint,
        })
    }

    /// Client of the upstream posts feed.
    pub fn upstream(settings: &Settings) -> LeaderboardResult<Self> {
        Self::new(
            &settings.feed_base_url,
            &settings.feed_user_agent,
            settings.feed_timeout(),
            Endpoint::AllPosts,
        )
    }

    /// Client of another leaderboard instance's `/api/posts` route.
    pub fn proxy(base_url: &str, settings: &Settings) -> LeaderboardResult<Self> {
        Self::new(
            base_url,
            &settings.feed_user_agent,
            settings.feed_timeout(),
            Endpoint::ProxyPosts,
        )
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }

    async fn get(&self) -> LeaderboardResult<Value> {
        let url = self.url();
        debug!("Fetching posts from {url}");

        let response = self
            .http_client
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LeaderboardError::UpstreamHttp(status.as_u16()));
        }

        let feed = response.json::<Value>().await?;
        debug!("Fetched feed from {url}");
        Ok(feed)
    }
}

#[async_trait]
impl PostsSource for FeedClient {
    async fn fetch_feed(&self) -> LeaderboardResult<Value> {
        self.get().await
    }
}
