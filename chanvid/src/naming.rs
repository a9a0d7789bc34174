use crate::model::RemoteFile;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

pub const FALLBACK_EXTENSION: &str = "mp4";

/// Reduces a remote-suggested name to a single safe path component.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name
        .rsplit(|ch| ch == '/' || ch == '\\')
        .next()
        .unwrap_or(name);
    let cleaned = last
        .chars()
        .filter(|ch| !ch.is_control() && !matches!(ch, ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect::<String>();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn fallback_file_name(message_id: i32, document_id: i64) -> String {
    format!("{}_{}.{}", message_id, document_id, FALLBACK_EXTENSION)
}

/// Hands out file names for one batch so that a remote document maps to at
/// most one local target, and two documents never share one.
#[derive(Debug, Default)]
pub struct TargetNamer {
    owners: HashMap<String, i64>,
    assigned: HashMap<i64, String>,
}

impl TargetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when this document already received a name in this batch.
    pub fn assign(&mut self, message_id: i32, remote: &RemoteFile) -> Option<String> {
        if self.assigned.contains_key(&remote.remote_id) {
            return None;
        }

        let preferred = remote
            .suggested_name
            .as_deref()
            .and_then(sanitize_file_name)
            .unwrap_or_else(|| fallback_file_name(message_id, remote.remote_id));

        let mut attempt = 0u32;
        let name = loop {
            let candidate = disambiguate(&preferred, message_id, remote.remote_id, attempt);
            if let Entry::Vacant(slot) = self.owners.entry(candidate) {
                let name = slot.key().clone();
                slot.insert(remote.remote_id);
                break name;
            }
            attempt += 1;
        };
        self.assigned.insert(remote.remote_id, name.clone());
        Some(name)
    }
}

fn disambiguate(preferred: &str, message_id: i32, document_id: i64, attempt: u32) -> String {
    match attempt {
        0 => preferred.to_string(),
        1 => format!("{}_{}", message_id, preferred),
        2 => format!("{}_{}_{}", message_id, document_id, preferred),
        n => format!("{}_{}_{}_{}", message_id, document_id, n - 2, preferred),
    }
}
