mod common;

use chanvid::{DownloadError, ResumableDownloader, TransferProgress};
use common::{ScriptedTransport, expected_bytes, remote_file};
use std::cell::RefCell;
use std::fs;
use std::path::Path;

#[derive(Default)]
struct Recorder {
    observed: RefCell<Vec<u64>>,
    finished: RefCell<Option<bool>>,
}

impl TransferProgress for Recorder {
    fn begin(&self, _path: &Path, start: u64, _total: u64) {
        self.observed.borrow_mut().push(start);
    }

    fn advance(&self, written: u64, _total: u64) {
        self.observed.borrow_mut().push(written);
    }

    fn finish(&self, _written: u64, _total: u64, completed: bool) {
        *self.finished.borrow_mut() = Some(completed);
    }
}

#[test]
fn fresh_transfer_takes_three_requests() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let transport = ScriptedTransport::new();
    let recorder = Recorder::default();

    let cursor = ResumableDownloader::new(&transport)
        .with_chunk_size(512_000)
        .transfer(&remote_file(9, 1_500_000), &path, 0, &recorder)
        .unwrap();

    assert_eq!(cursor, 1_500_000);
    assert_eq!(
        transport.calls_for(9),
        vec![(0, 512_000), (512_000, 512_000), (1_024_000, 476_000)]
    );
    assert_eq!(fs::read(&path).unwrap(), expected_bytes(9, 0..1_500_000));
    assert_eq!(
        *recorder.observed.borrow(),
        vec![0, 512_000, 1_024_000, 1_500_000]
    );
    assert_eq!(*recorder.finished.borrow(), Some(true));
}

#[test]
fn resumed_transfer_matches_fresh_download() {
    let total = 10_000u64;
    for chunk_size in [777u32, 4096] {
        for local in [1u64, 999, 5_000, 9_999] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("clip.mp4");
            fs::write(&path, expected_bytes(3, 0..local)).unwrap();

            let transport = ScriptedTransport::new();
            ResumableDownloader::new(&transport)
                .with_chunk_size(chunk_size)
                .transfer(&remote_file(3, total), &path, local, &chanvid::NoProgress)
                .unwrap();

            assert_eq!(transport.calls_for(3)[0].0, local);
            assert_eq!(
                fs::read(&path).unwrap(),
                expected_bytes(3, 0..total),
                "chunk {chunk_size}, resumed at {local}"
            );
        }
    }
}

#[test]
fn short_reads_continue_from_the_new_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let transport = ScriptedTransport {
        max_payload: Some(300),
        ..ScriptedTransport::new()
    };
    let recorder = Recorder::default();

    ResumableDownloader::new(&transport)
        .with_chunk_size(1024)
        .transfer(&remote_file(4, 2_000), &path, 0, &recorder)
        .unwrap();

    let offsets: Vec<u64> = transport.calls_for(4).iter().map(|(offset, _)| *offset).collect();
    assert_eq!(offsets, vec![0, 300, 600, 900, 1200, 1500, 1800]);
    let observed = recorder.observed.borrow();
    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(observed.iter().all(|cursor| *cursor <= 2_000));
    assert_eq!(fs::read(&path).unwrap(), expected_bytes(4, 0..2_000));
}

#[test]
fn transport_failure_keeps_committed_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let transport = ScriptedTransport {
        fail_after_calls: Some(2),
        ..ScriptedTransport::new()
    };
    let recorder = Recorder::default();

    let err = ResumableDownloader::new(&transport)
        .with_chunk_size(1000)
        .transfer(&remote_file(5, 5_000), &path, 0, &recorder)
        .unwrap_err();

    assert!(matches!(err, DownloadError::Transport { offset: 2000, .. }));
    assert!(!err.is_structural());
    assert_eq!(transport.calls_for(5).len(), 3);
    assert_eq!(fs::read(&path).unwrap(), expected_bytes(5, 0..2_000));
    assert_eq!(*recorder.finished.borrow(), Some(false));
}

#[test]
fn redirect_is_fatal_for_the_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    fs::write(&path, expected_bytes(6, 0..100)).unwrap();
    let transport = ScriptedTransport {
        redirect_on_resume: [6].into_iter().collect(),
        ..ScriptedTransport::new()
    };

    let err = ResumableDownloader::new(&transport)
        .transfer(&remote_file(6, 1_000), &path, 100, &chanvid::NoProgress)
        .unwrap_err();

    assert!(matches!(err, DownloadError::UnsupportedRedirect { dc_id: 5 }));
    assert_eq!(fs::read(&path).unwrap(), expected_bytes(6, 0..100));
}

#[test]
fn empty_payload_before_the_end_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let transport = ScriptedTransport {
        max_payload: Some(0),
        ..ScriptedTransport::new()
    };

    let err = ResumableDownloader::new(&transport)
        .transfer(&remote_file(7, 10), &path, 0, &chanvid::NoProgress)
        .unwrap_err();

    assert!(matches!(err, DownloadError::EmptyChunk { offset: 0, total: 10 }));
    assert_eq!(transport.calls_for(7).len(), 1);
}

#[test]
fn zero_length_document_creates_empty_file_without_requests() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.mp4");
    let transport = ScriptedTransport::new();

    let cursor = ResumableDownloader::new(&transport)
        .transfer(&remote_file(8, 0), &path, 0, &chanvid::NoProgress)
        .unwrap();

    assert_eq!(cursor, 0);
    assert!(transport.calls.borrow().is_empty());
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}
