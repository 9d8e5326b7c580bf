//! Ephemeral storage slot
//!
//! Holds one image on disk between generation and hand-off to the
//! transport. The file is removed when the slot is dropped, on every path.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::gateway::ImageArtifact;

/// Uniquely named temporary image file
#[derive(Debug)]
pub struct StorageSlot {
    file: NamedTempFile,
}

impl StorageSlot {
    /// Create a slot in `dir` named after the request and write the image
    pub async fn create(dir: &Path, request_id: Uuid, image: &ImageArtifact) -> io::Result<Self> {
        let file = Builder::new()
            .prefix(&format!("infobot-{}-", request_id))
            .suffix(&format!(".{}", ImageArtifact::EXTENSION))
            .tempfile_in(dir)?;

        // Dropping `file` on a failed write removes it
        tokio::fs::write(file.path(), image.bytes()).await?;

        debug!(
            "Stored image in {} ({} bytes)",
            file.path().display(),
            image.bytes().len()
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the file now, reporting failures
    pub fn close(self) {
        let path: PathBuf = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
