use crate::downloader::{NoProgress, ResumableDownloader, TransferProgress};
use crate::error::DownloadError;
use crate::model::{Message, RemoteFile};
use crate::naming::TargetNamer;
use crate::reconcile::{Action, Reconciler, ResumeDecider};
use crate::signal::StopSignal;
use crate::transport::ChunkTransport;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub message_id: i32,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Video documents seen in the page, duplicates excluded.
    pub found: usize,
    pub downloaded: usize,
    pub resumed: usize,
    pub skipped: usize,
    pub failed: Vec<FailedItem>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Downloaded { resumed: bool },
    Skipped,
}

/// Walks one page of history and pulls every video it finds into a single
/// output directory, one file at a time.
pub struct VideoExtractor<'a, T> {
    downloader: ResumableDownloader<T>,
    reconciler: Reconciler<'a>,
    progress: &'a dyn TransferProgress,
    stop: StopSignal,
}

impl<'a, T: ChunkTransport> VideoExtractor<'a, T> {
    pub fn new(downloader: ResumableDownloader<T>, decider: &'a dyn ResumeDecider) -> Self {
        Self {
            downloader,
            reconciler: Reconciler::new(decider),
            progress: &NoProgress,
            stop: StopSignal::new(),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn TransferProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.downloader = self.downloader.with_stop_signal(stop.clone());
        self.stop = stop;
        self
    }

    /// Only a failure to create `output_dir` is returned as an error; every
    /// per-file problem is logged and recorded in the summary instead.
    pub fn process(&self, messages: &[Message], output_dir: &Path) -> Result<BatchSummary> {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("failed to create output directory {}", output_dir.display())
        })?;

        let mut summary = BatchSummary::default();
        let mut namer = TargetNamer::new();

        for message in messages {
            if self.stop.is_stopped() {
                info!("stop requested; leaving the remaining messages for the next run");
                summary.cancelled = true;
                break;
            }

            let Some(document) = message.video_document() else {
                continue;
            };
            let remote = document.remote_file();
            let Some(file_name) = namer.assign(message.id(), &remote) else {
                debug!(
                    message_id = message.id(),
                    document_id = remote.remote_id,
                    "document already handled in this batch"
                );
                continue;
            };

            summary.found += 1;
            let target = output_dir.join(&file_name);
            info!(
                index = summary.found,
                message_id = message.id(),
                file = %file_name,
                size = remote.total_size,
                "found video"
            );

            match self.process_one(&target, &remote) {
                Ok(FileOutcome::Downloaded { resumed }) => {
                    info!(path = %target.display(), "download complete");
                    summary.downloaded += 1;
                    if resumed {
                        summary.resumed += 1;
                    }
                }
                Ok(FileOutcome::Skipped) => summary.skipped += 1,
                Err(DownloadError::Cancelled { offset }) => {
                    info!(
                        path = %target.display(),
                        offset,
                        "transfer stopped; partial file kept for a later resume"
                    );
                    summary.cancelled = true;
                    break;
                }
                Err(err) => {
                    error!(
                        message_id = message.id(),
                        path = %target.display(),
                        error = %err,
                        "failed to download video"
                    );
                    summary.failed.push(FailedItem {
                        message_id: message.id(),
                        path: target,
                        error: err.to_string(),
                    });
                }
            }
        }

        if summary.found == 0 {
            info!("no videos found in this batch of messages");
        }
        Ok(summary)
    }

    fn process_one(&self, target: &Path, remote: &RemoteFile) -> Result<FileOutcome, DownloadError> {
        let decision = self.reconciler.reconcile(target, remote)?;
        if decision.action == Action::Skip {
            return Ok(FileOutcome::Skipped);
        }

        match self
            .downloader
            .transfer(remote, target, decision.offset, self.progress)
        {
            Ok(_) => Ok(FileOutcome::Downloaded {
                resumed: decision.action == Action::Resume,
            }),
            Err(err) => {
                let Some(fresh) = self.reconciler.fallback(target, decision, &err) else {
                    return Err(err);
                };
                self.downloader
                    .transfer(remote, target, fresh.offset, self.progress)?;
                Ok(FileOutcome::Downloaded { resumed: false })
            }
        }
    }
}
