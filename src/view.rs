pub mod templates;

use chrono::{DateTime, Local, Utc};
use minijinja::context;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info};

use crate::cache::PostsCache;
use crate::error::{LeaderboardError, LeaderboardResult};
use crate::feed::client::PostsSource;
use crate::feed::models::LeaderboardEntry;
use crate::leaderboard::generate;
use crate::utils::format_rank;
use templates::PageTemplate;

/// The only failure message end users ever see.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load leaderboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    Loading,
    Refreshing,
    Error,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    // Page mount, or retry from the error state
    Initial,
    // Manual refresh, keeps the displayed entries until new data lands
    Refresh,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub status: ViewStatus,
    pub entries: Vec<LeaderboardEntry>,
    pub error: Option<&'static str>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            status: ViewStatus::Loading,
            entries: Vec::new(),
            error: None,
            last_updated: None,
        }
    }
}

impl ViewState {
    fn begin(&mut self, kind: LoadKind) {
        self.status = match kind {
            LoadKind::Initial => ViewStatus::Loading,
            LoadKind::Refresh => ViewStatus::Refreshing,
        };
    }

    fn loaded(&mut self, entries: Vec<LeaderboardEntry>, at: DateTime<Utc>) {
        self.status = ViewStatus::Loaded;
        self.entries = entries;
        self.error = None;
        self.last_updated = Some(at);
    }

    fn failed(&mut self) {
        self.status = ViewStatus::Error;
        self.error = Some(LOAD_FAILED_MESSAGE);
    }

    pub fn is_empty(&self) -> bool {
        self.status == ViewStatus::Loaded && self.entries.is_empty()
    }

    /// Renders the page for the current state.
    pub fn render(&self) -> LeaderboardResult<String> {
        let rendered = match self.status {
            ViewStatus::Loading => PageTemplate::Loading.get()?.render(context! {}),
            ViewStatus::Error => PageTemplate::Error
                .get()?
                .render(context! { message => self.error.unwrap_or(LOAD_FAILED_MESSAGE) }),
            ViewStatus::Refreshing | ViewStatus::Loaded => {
                #[derive(Serialize)]
                struct RankedEntry<'a> {
                    rank: String,
                    #[serde(flatten)]
                    entry: &'a LeaderboardEntry,
                }

                let entries = self
                    .entries
                    .iter()
                    .enumerate()
                    .map(|(index, entry)| RankedEntry {
                        rank: format_rank(index),
                        entry,
                    })
                    .collect::<Vec<_>>();
                let last_updated = self
                    .last_updated
                    .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string());

                PageTemplate::Leaderboard.get()?.render(context! {
                    entries => entries,
                    last_updated => last_updated,
                    refreshing => self.status == ViewStatus::Refreshing,
                })
            }
        };
        rendered.map_err(|e| LeaderboardError::Parse(e.to_string()))
    }
}

/// Presentation state of the leaderboard page and its load path.
pub struct LeaderboardView {
    state: Mutex<ViewState>,
    cache: PostsCache,
    source: Arc<dyn PostsSource>,
}

impl LeaderboardView {
    pub fn new(cache: PostsCache, source: Arc<dyn PostsSource>) -> Self {
        LeaderboardView {
            state: Mutex::new(ViewState::default()),
            cache,
            source,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ViewState {
        self.lock().clone()
    }

    /// Runs the load path and returns the resulting state.
    pub async fn load(&self, kind: LoadKind) -> ViewState {
        self.lock().begin(kind);

        let result = self.cache.fetch_posts(self.source.as_ref()).await;

        let mut state = self.lock();
        match result {
            Ok(posts) => {
                let entries = generate(&posts);
                info!("Leaderboard loaded with {} entries.", entries.len());
                state.loaded(entries, Utc::now());
            }
            Err(e) => {
                error!("{LOAD_FAILED_MESSAGE}: {e}");
                state.failed();
            }
        }
        state.clone()
    }
}
