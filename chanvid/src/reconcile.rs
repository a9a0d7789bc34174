use crate::error::DownloadError;
use crate::model::RemoteFile;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadState {
    Absent,
    Partial(u64),
    Complete(u64),
}

impl DownloadState {
    pub fn inspect(path: &Path, total_size: u64) -> io::Result<Self> {
        match fs::metadata(path) {
            Ok(meta) if meta.len() >= total_size => Ok(DownloadState::Complete(meta.len())),
            Ok(meta) => Ok(DownloadState::Partial(meta.len())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(DownloadState::Absent),
            Err(err) => Err(err),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    StartFresh,
    Resume,
    Skip,
}

impl Action {
    /// Operator answer to the continue/new/skip question.
    pub fn from_choice(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "c" | "continue" => Some(Action::Resume),
            "n" | "new" => Some(Action::StartFresh),
            "s" | "skip" => Some(Action::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::StartFresh => "new",
            Action::Resume => "continue",
            Action::Skip => "skip",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub offset: u64,
}

impl Decision {
    pub fn fresh() -> Self {
        Self {
            action: Action::StartFresh,
            offset: 0,
        }
    }

    pub fn skip() -> Self {
        Self {
            action: Action::Skip,
            offset: 0,
        }
    }
}

/// What a decider gets to see about a partially downloaded file.
#[derive(Debug)]
pub struct PartialFile<'a> {
    pub path: &'a Path,
    pub local_size: u64,
    pub total_size: u64,
}

pub trait ResumeDecider {
    fn decide(&self, partial: &PartialFile<'_>) -> Action;
}

/// Answers every question the same way; used for unattended runs.
#[derive(Clone, Copy, Debug)]
pub struct FixedDecision(pub Action);

impl ResumeDecider for FixedDecision {
    fn decide(&self, _partial: &PartialFile<'_>) -> Action {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PartialPolicy {
    #[default]
    Ask,
    Continue,
    New,
    Skip,
}

impl PartialPolicy {
    /// `None` means the operator has to be asked.
    pub fn fixed_action(self) -> Option<Action> {
        match self {
            PartialPolicy::Ask => None,
            PartialPolicy::Continue => Some(Action::Resume),
            PartialPolicy::New => Some(Action::StartFresh),
            PartialPolicy::Skip => Some(Action::Skip),
        }
    }
}

impl FromStr for PartialPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(PartialPolicy::Ask),
            "continue" | "c" | "resume" => Ok(PartialPolicy::Continue),
            "new" | "n" => Ok(PartialPolicy::New),
            "skip" | "s" => Ok(PartialPolicy::Skip),
            other => Err(format!(
                "unknown partial-file policy '{other}' (expected ask, continue, new or skip)"
            )),
        }
    }
}

impl fmt::Display for PartialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PartialPolicy::Ask => "ask",
            PartialPolicy::Continue => "continue",
            PartialPolicy::New => "new",
            PartialPolicy::Skip => "skip",
        };
        f.write_str(label)
    }
}

pub struct Reconciler<'a> {
    decider: &'a dyn ResumeDecider,
}

impl<'a> Reconciler<'a> {
    pub fn new(decider: &'a dyn ResumeDecider) -> Self {
        Self { decider }
    }

    /// Compares the local file against the remote size and settles on one
    /// action for this file. Files that are already complete are always
    /// skipped without asking.
    pub fn reconcile(&self, target: &Path, remote: &RemoteFile) -> Result<Decision, DownloadError> {
        let state = DownloadState::inspect(target, remote.total_size)
            .map_err(|err| DownloadError::storage(target, err))?;

        let local_size = match state {
            DownloadState::Absent => return Ok(Decision::fresh()),
            DownloadState::Complete(local_size) => {
                info!(
                    path = %target.display(),
                    local_size,
                    total = remote.total_size,
                    "already complete, skipping"
                );
                return Ok(Decision::skip());
            }
            DownloadState::Partial(local_size) => local_size,
        };

        let action = self.decider.decide(&PartialFile {
            path: target,
            local_size,
            total_size: remote.total_size,
        });
        let decision = match action {
            Action::Resume => {
                info!(path = %target.display(), offset = local_size, "resuming partial file");
                Decision {
                    action,
                    offset: local_size,
                }
            }
            Action::StartFresh => {
                info!(path = %target.display(), discarded = local_size, "restarting from scratch");
                Decision::fresh()
            }
            Action::Skip => {
                info!(path = %target.display(), local_size, "leaving partial file untouched");
                Decision::skip()
            }
        };
        Ok(decision)
    }

    /// One-time downgrade of a failed resume to a fresh transfer. Returns
    /// `None` when the failure is not worth a fresh attempt or the failed
    /// attempt was not a resume to begin with.
    pub fn fallback(&self, target: &Path, failed: Decision, error: &DownloadError) -> Option<Decision> {
        if failed.action != Action::Resume || !error.is_structural() {
            return None;
        }
        warn!(
            path = %target.display(),
            offset = failed.offset,
            error = %error,
            "resume failed, discarding partial file and starting over"
        );
        Some(Decision::fresh())
    }
}
