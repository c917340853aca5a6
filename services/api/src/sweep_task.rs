//! services/api/src/sweep_task.rs
//!
//! Background task that periodically removes upload namespaces whose course
//! never landed.

use chrono::Utc;
use course_builder_core::ports::{CourseStore, ObjectStore};
use course_builder_core::sweep::sweep_orphans;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub fn spawn_orphan_sweeper(
    objects: Arc<dyn ObjectStore>,
    store: Arc<dyn CourseStore>,
    ttl: Duration,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1));
        let mut ticker = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Orphan sweeper stopped.");
                    break;
                }
                _ = ticker.tick() => {
                    let cutoff = Utc::now() - ttl;
                    if let Err(e) = sweep_orphans(objects.as_ref(), store.as_ref(), cutoff).await {
                        error!("Orphan sweep failed: {}", e);
                    }
                }
            }
        }
    })
}
