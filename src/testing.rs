use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::cache::Clock;
use crate::error::{LeaderboardError, LeaderboardResult};
use crate::feed::client::PostsSource;
use crate::feed::models::Post;
use crate::storage::Storage;

pub fn post(id: &str, slack_id: &str, game_name: &str, seeds: &[i64]) -> Post {
    Post {
        post_id: id.to_string(),
        slack_id: Some(slack_id.to_string()),
        game_name: Some(game_name.to_string()),
        seeds: Some(seeds.to_vec()),
        ..Default::default()
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Posts(Vec<Post>),
    // Raw payload, for feeds that do not decode as posts
    Feed(Value),
    Status(u16),
}

/// Posts source answering from a script. The last reply repeats forever.
pub struct StubSource {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn new(replies: Vec<Reply>) -> Self {
        StubSource {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn posts(posts: Vec<Post>) -> Self {
        Self::new(vec![Reply::Posts(posts)])
    }

    pub fn failing(status: u16) -> Self {
        Self::new(vec![Reply::Status(status)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostsSource for StubSource {
    async fn fetch_feed(&self) -> LeaderboardResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap_or(Reply::Status(500))
            }
        };
        match reply {
            Reply::Posts(posts) => Ok(serde_json::to_value(posts)?),
            Reply::Feed(feed) => Ok(feed),
            Reply::Status(status) => Err(LeaderboardError::UpstreamHttp(status)),
        }
    }
}

/// Storage whose every operation fails, like a full disk or a denied directory.
pub struct FailingStorage;

impl Storage for FailingStorage {
    fn get(&self, _key: &str) -> LeaderboardResult<Option<String>> {
        Err(LeaderboardError::Storage("read denied".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> LeaderboardResult<()> {
        Err(LeaderboardError::Storage("write denied".to_string()))
    }

    fn remove(&self, _key: &str) -> LeaderboardResult<()> {
        Err(LeaderboardError::Storage("remove denied".to_string()))
    }
}
