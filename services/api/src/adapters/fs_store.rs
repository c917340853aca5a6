//! services/api/src/adapters/fs_store.rs
//!
//! A local-disk implementation of the `ObjectStore` port. Every submission gets
//! its own directory under the storage root, and the directory is served
//! read-only under `PUBLIC_BASE_URL`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use course_builder_core::ports::{ObjectStore, PortError, PortResult};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Prefix of the temporary file an upload is written to before it is renamed
/// into place, so a failed write never leaves a partial object.
const TEMP_UPLOAD_PREFIX: &str = ".upload-";

#[derive(Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a destination hint inside the namespace directory, refusing
    /// anything that would climb out of it.
    fn object_path(&self, namespace: Uuid, destination_hint: &str) -> PortResult<PathBuf> {
        let hint = Path::new(destination_hint);
        let well_formed = !destination_hint.is_empty()
            && hint.components().all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(PortError::Unexpected(format!(
                "Refusing destination hint '{}'",
                destination_hint
            )));
        }
        Ok(self.root.join(namespace.to_string()).join(hint))
    }
}

fn io_error(context: &str, e: std::io::Error) -> PortError {
    PortError::Unexpected(format!("{}: {}", context, e))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        namespace: Uuid,
        destination_hint: &str,
        _content_type: &str,
        bytes: Bytes,
    ) -> PortResult<String> {
        let path = self.object_path(namespace, destination_hint)?;
        let parent = path
            .parent()
            .ok_or_else(|| PortError::Unexpected(format!("No parent for {}", path.display())))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("Failed to create upload directory", e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!("{}{}", TEMP_UPLOAD_PREFIX, file_name));
        if let Err(e) = tokio::fs::write(&temp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_error("Failed to write upload", e));
        }
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| io_error("Failed to move upload into place", e))?;

        debug!(%namespace, destination_hint, size = bytes.len(), "Stored object");
        Ok(format!(
            "{}/{}/{}",
            self.public_base_url, namespace, destination_hint
        ))
    }

    async fn delete_namespace(&self, namespace: Uuid) -> PortResult<()> {
        match tokio::fs::remove_dir_all(self.root.join(namespace.to_string())).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("Failed to delete namespace", e)),
        }
    }

    async fn stale_namespaces(&self, older_than: DateTime<Utc>) -> PortResult<Vec<Uuid>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("Failed to list storage root", e)),
        };

        let mut stale = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("Failed to list storage root", e))?
        {
            let Some(namespace) = entry
                .file_name()
                .to_str()
                .and_then(|name| Uuid::parse_str(name).ok())
            else {
                continue;
            };
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| io_error("Failed to read namespace metadata", e))?;
            if !metadata.is_dir() {
                continue;
            }
            let modified: DateTime<Utc> = metadata
                .modified()
                .map_err(|e| io_error("Failed to read namespace mtime", e))?
                .into();
            if modified < older_than {
                stale.push(namespace);
            }
        }
        Ok(stale)
    }
}
