pub mod downloader;
pub mod error;
pub mod extractor;
pub mod model;
pub mod naming;
pub mod reconcile;
pub mod signal;
pub mod transport;

pub use downloader::{NoProgress, ResumableDownloader, TransferProgress};
pub use error::DownloadError;
pub use extractor::{BatchSummary, FailedItem, VideoExtractor};
pub use model::{ChannelHandle, FileLocation, HistoryPage, Message, RemoteFile};
pub use reconcile::{Action, Decision, DownloadState, FixedDecision, PartialPolicy, Reconciler, ResumeDecider};
pub use signal::StopSignal;
pub use transport::{ChunkResponse, ChunkTransport, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
