#![allow(dead_code)]

use anyhow::anyhow;
use chanvid::{ChunkResponse, ChunkTransport, FileLocation, Message, RemoteFile};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;

pub fn byte_at(document_id: i64, offset: u64) -> u8 {
    (offset.wrapping_mul(31).wrapping_add(document_id as u64 * 7) % 251) as u8
}

pub fn expected_bytes(document_id: i64, range: std::ops::Range<u64>) -> Vec<u8> {
    range.map(|offset| byte_at(document_id, offset)).collect()
}

/// In-memory stand-in for the RPC transport. Content is a pure function of
/// document id and offset, so any sequence of range reads reassembles into the
/// same bytes.
#[derive(Default)]
pub struct ScriptedTransport {
    pub calls: RefCell<Vec<(i64, u64, u32)>>,
    pub failing: HashSet<i64>,
    pub redirect_on_resume: HashSet<i64>,
    pub fail_after_calls: Option<usize>,
    pub max_payload: Option<u32>,
    pub served: Cell<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls_for(&self, document_id: i64) -> Vec<(u64, u32)> {
        self.calls
            .borrow()
            .iter()
            .filter(|(id, _, _)| *id == document_id)
            .map(|(_, offset, limit)| (*offset, *limit))
            .collect()
    }
}

impl ChunkTransport for ScriptedTransport {
    fn fetch_range(
        &self,
        location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> anyhow::Result<ChunkResponse> {
        self.calls.borrow_mut().push((location.id, offset, limit));

        if self.failing.contains(&location.id) {
            return Err(anyhow!("rpc error: FILE_REFERENCE_EXPIRED"));
        }
        if offset > 0 && self.redirect_on_resume.contains(&location.id) {
            return Ok(ChunkResponse::Redirect { dc_id: 5 });
        }
        if let Some(limit_calls) = self.fail_after_calls {
            if self.served.get() >= limit_calls {
                return Err(anyhow!("connection reset by peer"));
            }
        }
        self.served.set(self.served.get() + 1);

        let end = offset + u64::from(self.max_payload.unwrap_or(limit).min(limit));
        Ok(ChunkResponse::Bytes(expected_bytes(location.id, offset..end)))
    }
}

pub fn remote_file(document_id: i64, size: u64) -> RemoteFile {
    RemoteFile {
        remote_id: document_id,
        total_size: size,
        suggested_name: None,
        location: FileLocation {
            id: document_id,
            access_hash: 42,
            file_reference: "ref".into(),
        },
    }
}

pub fn video_message(message_id: i32, document_id: i64, size: u64, file_name: Option<&str>) -> Message {
    let mut attributes = vec![json!({"_": "documentAttributeVideo", "duration": 12.0, "w": 1280, "h": 720})];
    if let Some(name) = file_name {
        attributes.push(json!({"_": "documentAttributeFilename", "file_name": name}));
    }
    serde_json::from_value(json!({
        "_": "message",
        "id": message_id,
        "media": {
            "_": "messageMediaDocument",
            "document": {
                "id": document_id,
                "access_hash": 42,
                "file_reference": "ref",
                "size": size,
                "mime_type": "video/mp4",
                "attributes": attributes,
            }
        }
    }))
    .expect("valid message json")
}

pub fn text_message(message_id: i32) -> Message {
    serde_json::from_value(json!({"_": "message", "id": message_id, "message": "hello"}))
        .expect("valid message json")
}

pub fn pdf_message(message_id: i32, document_id: i64) -> Message {
    serde_json::from_value(json!({
        "_": "message",
        "id": message_id,
        "media": {
            "_": "messageMediaDocument",
            "document": {
                "id": document_id,
                "access_hash": 1,
                "size": 100,
                "mime_type": "application/pdf",
                "attributes": [{"_": "documentAttributeFilename", "file_name": "report.pdf"}],
            }
        }
    }))
    .expect("valid message json")
}
