//! Periodic cleanup of expired revocations
//!
//! Once a token is past its `exp` the validator rejects it without a
//! revocation lookup, so its revocation row can go.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::repositories::RevocationStore;

/// A revocation store with a name for the logs
#[derive(Clone)]
pub struct PurgeTarget {
    pub name: &'static str,
    pub store: Arc<dyn RevocationStore>,
}

/// Purge every target once; failures are logged and skipped
///
/// Returns the total number of entries removed.
pub async fn purge_all(targets: &[PurgeTarget]) -> u64 {
    let mut removed = 0;
    for target in targets {
        match target.store.purge_expired().await {
            Ok(count) => {
                if count > 0 {
                    info!("Purged {} expired revocations from {}", count, target.name);
                }
                removed += count;
            }
            Err(e) => error!("Failed to purge expired revocations from {}: {}", target.name, e),
        }
    }
    removed
}

/// Schedule [`purge_all`] on a cron expression
///
/// The returned scheduler must be kept alive for the job to keep running.
pub async fn start_purge_job(schedule: &str, targets: Vec<PurgeTarget>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_, _| {
        let targets = targets.clone();
        Box::pin(async move {
            let removed = purge_all(&targets).await;
            info!("Revocation purge job executed, {} entries removed", removed);
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Started revocation purge scheduler with schedule: {}", schedule);
    Ok(scheduler)
}
