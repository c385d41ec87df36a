use shomato_leaderboard::cache::{PostsCache, SystemClock};
use shomato_leaderboard::cli::Cli;
use shomato_leaderboard::config::Settings;
use shomato_leaderboard::feed::client::{FeedClient, PostsSource};
use shomato_leaderboard::routes::{router, AppState};
use shomato_leaderboard::scheduler::RefreshScheduler;
use shomato_leaderboard::server::serve;
use shomato_leaderboard::storage::FileStorage;
use shomato_leaderboard::view::LeaderboardView;

use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::new(Cli::parse())?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(settings.get_trace_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let upstream: Arc<dyn PostsSource> = Arc::new(FeedClient::upstream(&settings)?);
    // The cache reads straight from the upstream feed unless pointed at another instance.
    let source: Arc<dyn PostsSource> = match &settings.posts_source_url {
        Some(url) => {
            info!("Reading posts through {url}");
            Arc::new(FeedClient::proxy(url, &settings)?)
        }
        None => upstream.clone(),
    };

    info!("Loading posts cache from {}.", settings.cache_dir.display());
    let cache = PostsCache::new(
        Arc::new(FileStorage::new(&settings.cache_dir)),
        Arc::new(SystemClock),
        settings.cache_duration(),
    );

    let mut scheduler =
        RefreshScheduler::new(cache.clone(), source.clone(), settings.update_interval()).await?;
    info!("Starting scheduler.");
    scheduler.start().await?;

    let state = AppState {
        feed: upstream,
        view: Arc::new(LeaderboardView::new(cache, source)),
    };
    let address = format!("{}:{}", settings.bind_address, settings.port);
    let served = serve(&address, router(state)).await;

    scheduler.shutdown().await?;
    served?;

    Ok(())
}
