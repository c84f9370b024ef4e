//! engine::upload
//!
//! Pending uploads: blobs received ahead of an upload-files commit.
//!
//! A blob lives at `<local>/uploads/<u0>/<u1>/<uuid>` until the commit that
//! consumes it succeeds, after which it is deleted. Only the UUID derives the
//! path; the original file name travels alongside in [`Upload`].

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::HostError;
use crate::core::paths::HostPaths;
use crate::core::treepath::is_safe_upload_name;

/// A pending upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub uuid: String,
    /// Name the file will have in the tree.
    pub name: String,
}

impl Upload {
    /// Where the blob is stored, or `None` for a malformed UUID.
    pub fn local_path(&self, paths: &HostPaths) -> Option<PathBuf> {
        paths.upload_path(&self.uuid)
    }
}

/// Store `content` as a new pending upload named `name`.
///
/// # Errors
///
/// `InvalidInput` when the name is empty, contains a separator or `..`,
/// or points into repository metadata.
pub async fn new_upload(paths: &HostPaths, name: &str, content: &[u8]) -> Result<Upload, HostError> {
    if !is_safe_upload_name(name) {
        return Err(HostError::InvalidInput(format!("unsafe upload name '{}'", name)));
    }

    let upload = Upload {
        uuid: Uuid::new_v4().to_string(),
        name: name.to_string(),
    };
    let path = upload
        .local_path(paths)
        .ok_or_else(|| HostError::Internal(format!("bad upload id {}", upload.uuid)))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HostError::io(parent, e))?;
    }
    tokio::fs::write(&path, content)
        .await
        .map_err(|e| HostError::io(&path, e))?;

    debug!(uuid = %upload.uuid, name, bytes = content.len(), "stored upload");
    Ok(upload)
}

/// Remove the blobs of `uploads`. Already-missing blobs are ignored.
pub async fn delete_uploads(paths: &HostPaths, uploads: &[Upload]) -> Result<(), HostError> {
    for upload in uploads {
        let Some(path) = upload.local_path(paths) else {
            warn!(uuid = %upload.uuid, "skipping upload with malformed id");
            continue;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(uuid = %upload.uuid, "deleted upload"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(HostError::io(path, e)),
        }
    }
    Ok(())
}
