use tokio_cron_scheduler::{Job, JobScheduler};

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::cache::PostsCache;
use crate::error::LeaderboardResult;
use crate::feed::client::PostsSource;

/// Owns the periodic background refresh of a posts cache.
pub struct RefreshScheduler {
    scheduler: JobScheduler,
    cache: PostsCache,
    source: Arc<dyn PostsSource>,
    interval: Duration,
    job_id: Option<uuid::Uuid>,
    started: bool,
}

impl RefreshScheduler {
    pub async fn new(
        cache: PostsCache,
        source: Arc<dyn PostsSource>,
        interval: Duration,
    ) -> LeaderboardResult<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(RefreshScheduler {
            scheduler,
            cache,
            source,
            interval,
            job_id: None,
            started: false,
        })
    }

    pub fn is_running(&self) -> bool {
        self.job_id.is_some()
    }

    pub async fn start(&mut self) -> LeaderboardResult<()> {
        if self.is_running() {
            return Ok(());
        }

        let job = background_update_job(self.interval, self.cache.clone(), self.source.clone())?;
        let job_id = self.scheduler.add(job).await?;
        if !self.started {
            self.scheduler.start().await?;
            self.started = true;
        }
        self.job_id = Some(job_id);

        info!(
            "Background updates scheduled every {} seconds.",
            self.interval.as_secs()
        );
        Ok(())
    }

    /// Removes the refresh job. `start` may be called again afterwards.
    pub async fn stop(&mut self) -> LeaderboardResult<()> {
        if let Some(job_id) = self.job_id.take() {
            self.scheduler.remove(&job_id).await?;
            info!("Background updates stopped.");
        }
        Ok(())
    }

    /// Stops the refresh job and tears the scheduler down for good.
    pub async fn shutdown(mut self) -> LeaderboardResult<()> {
        self.stop().await?;
        if self.started {
            self.scheduler.shutdown().await?;
        }
        Ok(())
    }
}

//////////////////
// Jobs definition
//////////////////

fn background_update_job(
    interval: Duration,
    cache: PostsCache,
    source: Arc<dyn PostsSource>,
) -> LeaderboardResult<Job> {
    let job = Job::new_repeated_async(interval, move |uuid, mut l| {
        let cache = cache.clone();
        let source = source.clone();
        Box::pin(async move {
            cache.background_update(source.as_ref()).await;

            // Query the next execution time for this job
            let next_tick = l.next_tick_for_job(uuid).await;
            match next_tick {
                Ok(Some(ts)) => info!("Next background update at {:?}", ts),
                _ => error!("Could not get next tick for background update job"),
            }
        })
    })?;
    Ok(job)
}
