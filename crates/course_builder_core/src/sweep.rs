//! crates/course_builder_core/src/sweep.rs
//!
//! Garbage collection for upload namespaces whose course never landed, e.g.
//! when the process died between the uploads and the persist.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::ports::{CourseStore, ObjectStore, PortResult};

/// Deletes every namespace last written before `older_than` that no persisted
/// course refers to. Returns how many were removed.
pub async fn sweep_orphans(
    objects: &dyn ObjectStore,
    store: &dyn CourseStore,
    older_than: DateTime<Utc>,
) -> PortResult<usize> {
    let mut removed = 0;
    for namespace in objects.stale_namespaces(older_than).await? {
        if store.namespace_landed(namespace).await? {
            continue;
        }
        match objects.delete_namespace(namespace).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(%namespace, "Failed to delete orphaned uploads: {}", e),
        }
    }
    if removed > 0 {
        info!(removed, "Swept orphaned upload namespaces");
    }
    Ok(removed)
}
