use crate::error::DownloadError;
use crate::model::RemoteFile;
use crate::signal::StopSignal;
use crate::transport::{ChunkResponse, ChunkTransport, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, trace};

/// Observer for a single transfer. Purely informational: nothing it does feeds
/// back into the download loop.
pub trait TransferProgress {
    fn begin(&self, path: &Path, start: u64, total: u64);
    fn advance(&self, written: u64, total: u64);
    fn finish(&self, written: u64, total: u64, completed: bool);
}

pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn begin(&self, _path: &Path, _start: u64, _total: u64) {}
    fn advance(&self, _written: u64, _total: u64) {}
    fn finish(&self, _written: u64, _total: u64, _completed: bool) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Requesting,
    Appending,
    Done,
    Failed,
}

/// Book-keeping for one file's transfer. `write_cursor` only moves after the
/// bytes it accounts for have been written and synced.
#[derive(Debug)]
pub(crate) struct TransferSession<'a> {
    remote: &'a RemoteFile,
    output_path: &'a Path,
    start_offset: u64,
    write_cursor: u64,
    bytes_total: u64,
    phase: SessionPhase,
}

impl<'a> TransferSession<'a> {
    fn new(remote: &'a RemoteFile, output_path: &'a Path, start_offset: u64) -> Self {
        Self {
            remote,
            output_path,
            start_offset,
            write_cursor: start_offset,
            bytes_total: remote.total_size,
            phase: SessionPhase::Idle,
        }
    }

    fn next_range(&self, chunk_size: u32) -> Option<(u64, u32)> {
        if self.write_cursor >= self.bytes_total {
            return None;
        }
        let remaining = self.bytes_total - self.write_cursor;
        let limit = remaining.min(u64::from(chunk_size)) as u32;
        Some((self.write_cursor, limit))
    }

    fn commit(&mut self, appended: u64) {
        self.write_cursor = self.write_cursor.saturating_add(appended).min(self.bytes_total);
    }
}

pub struct ResumableDownloader<T> {
    transport: T,
    chunk_size: u32,
    stop: StopSignal,
}

impl<T: ChunkTransport> ResumableDownloader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            chunk_size: DEFAULT_CHUNK_SIZE,
            stop: StopSignal::new(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Pulls `remote` into `output_path` starting at `start_offset` and returns
    /// the final write cursor. On error the file keeps every chunk committed so
    /// far and is never removed here.
    pub fn transfer(
        &self,
        remote: &RemoteFile,
        output_path: &Path,
        start_offset: u64,
        progress: &dyn TransferProgress,
    ) -> Result<u64, DownloadError> {
        let mut file = open_target(output_path, start_offset)?;
        let mut session = TransferSession::new(remote, output_path, start_offset);
        progress.begin(output_path, start_offset, session.bytes_total);

        let result = self.run(&mut session, &mut file, progress);
        drop(file);

        session.phase = match result {
            Ok(()) => SessionPhase::Done,
            Err(_) => SessionPhase::Failed,
        };
        progress.finish(
            session.write_cursor,
            session.bytes_total,
            session.phase == SessionPhase::Done,
        );
        debug!(
            path = %output_path.display(),
            start = session.start_offset,
            cursor = session.write_cursor,
            phase = ?session.phase,
            "transfer session closed"
        );

        result.map(|()| session.write_cursor)
    }

    fn run(
        &self,
        session: &mut TransferSession<'_>,
        file: &mut File,
        progress: &dyn TransferProgress,
    ) -> Result<(), DownloadError> {
        while let Some((offset, limit)) = session.next_range(self.chunk_size) {
            if self.stop.is_stopped() {
                return Err(DownloadError::Cancelled { offset });
            }

            session.phase = SessionPhase::Requesting;
            trace!(offset, limit, "requesting chunk");
            let response = self
                .transport
                .fetch_range(&session.remote.location, offset, limit)
                .map_err(|source| DownloadError::Transport { offset, source })?;

            let payload = match response {
                ChunkResponse::Bytes(payload) => payload,
                ChunkResponse::Redirect { dc_id } => {
                    return Err(DownloadError::UnsupportedRedirect { dc_id });
                }
            };
            if payload.len() > limit as usize {
                return Err(DownloadError::OversizedChunk {
                    offset,
                    limit,
                    received: payload.len(),
                });
            }
            if payload.is_empty() {
                return Err(DownloadError::EmptyChunk {
                    offset,
                    total: session.bytes_total,
                });
            }

            session.phase = SessionPhase::Appending;
            file.write_all(&payload)
                .and_then(|()| file.sync_data())
                .map_err(|err| DownloadError::storage(session.output_path, err))?;
            session.commit(payload.len() as u64);
            progress.advance(session.write_cursor, session.bytes_total);
        }

        Ok(())
    }
}

fn open_target(path: &Path, start_offset: u64) -> Result<File, DownloadError> {
    if start_offset == 0 {
        return File::create(path).map_err(|err| DownloadError::storage(path, err));
    }

    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|err| DownloadError::storage(path, err))?;
    let found = file
        .metadata()
        .map_err(|err| DownloadError::storage(path, err))?
        .len();
    if found != start_offset {
        return Err(DownloadError::OffsetMismatch {
            path: path.to_path_buf(),
            expected: start_offset,
            found,
        });
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileLocation;
    use std::cell::RefCell;

    struct Patterned {
        calls: RefCell<Vec<(u64, u32)>>,
    }

    impl ChunkTransport for Patterned {
        fn fetch_range(
            &self,
            _location: &FileLocation,
            offset: u64,
            limit: u32,
        ) -> anyhow::Result<ChunkResponse> {
            self.calls.borrow_mut().push((offset, limit));
            Ok(ChunkResponse::Bytes(
                (offset..offset + u64::from(limit)).map(|i| (i % 251) as u8).collect(),
            ))
        }
    }

    fn remote(total: u64) -> RemoteFile {
        RemoteFile {
            remote_id: 1,
            total_size: total,
            suggested_name: None,
            location: FileLocation {
                id: 1,
                access_hash: 2,
                file_reference: String::new(),
            },
        }
    }

    #[test]
    fn next_range_clamps_to_remaining_bytes() {
        let file = remote(10);
        let mut session = TransferSession::new(&file, Path::new("x"), 0);
        assert_eq!(session.next_range(4), Some((0, 4)));
        session.commit(4);
        session.commit(4);
        assert_eq!(session.next_range(4), Some((8, 2)));
        session.commit(2);
        assert_eq!(session.next_range(4), None);
        assert_eq!(session.phase, SessionPhase::Idle);
    }

    #[test]
    fn chunk_size_is_clamped_to_protocol_maximum() {
        let transport = Patterned {
            calls: RefCell::new(Vec::new()),
        };
        let downloader = ResumableDownloader::new(&transport).with_chunk_size(8 * 1024 * 1024);
        assert_eq!(downloader.chunk_size(), MAX_CHUNK_SIZE);
        let downloader = ResumableDownloader::new(&transport).with_chunk_size(0);
        assert_eq!(downloader.chunk_size(), 1);
    }

    #[test]
    fn resume_refuses_misaligned_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![0u8; 10]).unwrap();
        let transport = Patterned {
            calls: RefCell::new(Vec::new()),
        };

        let err = ResumableDownloader::new(&transport)
            .transfer(&remote(100), &path, 20, &NoProgress)
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadError::OffsetMismatch {
                expected: 20,
                found: 10,
                ..
            }
        ));
        assert!(err.is_structural());
        assert!(transport.calls.borrow().is_empty());
    }

    #[test]
    fn stop_signal_halts_between_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let transport = Patterned {
            calls: RefCell::new(Vec::new()),
        };
        let stop = StopSignal::new();
        stop.stop();

        let err = ResumableDownloader::new(&transport)
            .with_stop_signal(stop)
            .transfer(&remote(100), &path, 0, &NoProgress)
            .unwrap_err();
        assert!(matches!(err, DownloadError::Cancelled { offset: 0 }));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
