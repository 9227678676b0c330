//! Capability boundary between the orchestrator and the presentation layer.
//!
//! The presentation side only ever holds a [`Bridge`]. It can ask for a job
//! to run, ask for the last result to be saved, and turn a selected file into
//! a path string. Filesystem and process access stay on the orchestrator side.
//! Every request carries a `oneshot` reply; the returned [`Pending`] resolves
//! once the orchestrator has answered.

use crate::model::{InfoEvent, JobOutcome};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Reply to a bridge request. Await it, or poll it with `try_recv`.
/// Resolves to an error if the orchestrator went away without answering.
pub type Pending<T> = oneshot::Receiver<T>;

/// Requests the presentation layer may send across the bridge.
#[derive(Debug)]
pub(crate) enum BridgeRequest {
    RunProgram {
        file_path: PathBuf,
        format_hint: String,
        reply: oneshot::Sender<JobOutcome>,
    },
    SaveFile {
        reply: oneshot::Sender<Option<PathBuf>>,
    },
}

/// Events flowing from the orchestrator to the presentation layer.
#[derive(Debug)]
pub enum ShellEvent {
    Info(InfoEvent),
    /// The save flow wants a destination. Answer `None` to cancel.
    DestinationRequested {
        default_path: PathBuf,
        reply: oneshot::Sender<Option<PathBuf>>,
    },
}

/// A file the user selected in the presentation layer, before it has been
/// resolved to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    raw: String,
}

impl FileHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn name(&self) -> &str {
        self.raw.trim()
    }

    pub fn is_empty(&self) -> bool {
        self.name().is_empty()
    }
}

pub struct Bridge {
    tx: UnboundedSender<BridgeRequest>,
}

/// Create a bridge and the receiving end the orchestrator serves.
pub(crate) fn channel() -> (Bridge, UnboundedReceiver<BridgeRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Bridge { tx }, rx)
}

impl Bridge {
    /// Run one deduplication job. Only one job runs at a time; requests
    /// sent while a job is in flight queue behind it.
    pub fn run_program(&self, file_path: &str, format_hint: &str) -> Pending<JobOutcome> {
        let (reply, pending) = oneshot::channel();
        let _ = self.tx.send(BridgeRequest::RunProgram {
            file_path: PathBuf::from(file_path),
            format_hint: format_hint.to_string(),
            reply,
        });
        pending
    }

    /// Save the last successful result. `None` when nothing was saved.
    pub fn save_file(&self) -> Pending<Option<PathBuf>> {
        let (reply, pending) = oneshot::channel();
        let _ = self.tx.send(BridgeRequest::SaveFile { reply });
        pending
    }

    /// Absolute path string for a selected file.
    pub fn path_for_file(&self, handle: &FileHandle) -> String {
        let path = Path::new(handle.name());
        if path.is_absolute() {
            return path.display().to_string();
        }
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path).display().to_string(),
            Err(_) => handle.name().to_string(),
        }
    }
}
