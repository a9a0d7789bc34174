use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("chunk request at offset {offset} failed: {source:#}")]
    Transport {
        offset: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("file is served from CDN data center {dc_id}, which is not supported")]
    UnsupportedRedirect { dc_id: i32 },
    #[error("storage error on {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} holds {found} bytes but resume expected {expected}", .path.display())]
    OffsetMismatch {
        path: PathBuf,
        expected: u64,
        found: u64,
    },
    #[error("remote returned no data at offset {offset} of {total}")]
    EmptyChunk { offset: u64, total: u64 },
    #[error("remote returned {received} bytes for a {limit}-byte request at offset {offset}")]
    OversizedChunk {
        offset: u64,
        limit: u32,
        received: usize,
    },
    #[error("transfer cancelled at offset {offset}")]
    Cancelled { offset: u64 },
}

impl DownloadError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DownloadError::Storage {
            path: path.into(),
            source,
        }
    }

    /// Failures that a fresh transfer from offset zero may get past.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DownloadError::UnsupportedRedirect { .. } | DownloadError::OffsetMismatch { .. }
        )
    }
}
