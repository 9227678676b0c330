//! Result save flow.
//!
//! Copies the last result artifact to a destination the user picks. The copy
//! never touches the source, so the same result can be saved repeatedly.

use crate::bridge::ShellEvent;
use crate::model::ResultArtifact;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// Asks the user where to put the result. `None` means cancelled.
pub trait DestinationPrompt {
    fn choose(&self, default_path: &Path) -> impl Future<Output = Option<PathBuf>> + Send;
}

/// Prompt with a predetermined answer (headless mode, tests).
#[derive(Debug, Clone, Default)]
pub struct FixedDestination(pub Option<PathBuf>);

impl DestinationPrompt for FixedDestination {
    fn choose(&self, _default_path: &Path) -> impl Future<Output = Option<PathBuf>> + Send {
        let dest = self.0.clone();
        async move { dest }
    }
}

/// Forwards the prompt to the presentation thread and waits for its answer.
pub struct ChannelPrompt {
    events: UnboundedSender<ShellEvent>,
}

impl ChannelPrompt {
    pub fn new(events: UnboundedSender<ShellEvent>) -> Self {
        Self { events }
    }
}

impl DestinationPrompt for ChannelPrompt {
    fn choose(&self, default_path: &Path) -> impl Future<Output = Option<PathBuf>> + Send {
        let (reply, answer) = oneshot::channel();
        let sent = self
            .events
            .send(ShellEvent::DestinationRequested {
                default_path: default_path.to_path_buf(),
                reply,
            })
            .is_ok();
        async move {
            if !sent {
                return None;
            }
            answer.await.ok().flatten()
        }
    }
}

/// What happened to a save request. Collapsed to `Option<PathBuf>` at the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    Cancelled,
    Failed(String),
}

impl SaveOutcome {
    pub fn into_destination(self) -> Option<PathBuf> {
        match self {
            SaveOutcome::Saved(p) => Some(p),
            SaveOutcome::Cancelled | SaveOutcome::Failed(_) => None,
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Copy `artifact` byte-for-byte to `dest`.
pub(crate) async fn copy_artifact(artifact: &ResultArtifact, dest: &Path) -> SaveOutcome {
    // Copying a file onto itself truncates it.
    if same_file(&artifact.path, dest) {
        return SaveOutcome::Saved(dest.to_path_buf());
    }
    match tokio::fs::copy(&artifact.path, dest).await {
        Ok(bytes) => {
            tracing::info!(
                source = %artifact.path.display(),
                destination = %dest.display(),
                bytes,
                "result saved"
            );
            SaveOutcome::Saved(dest.to_path_buf())
        }
        Err(e) => {
            tracing::warn!(
                source = %artifact.path.display(),
                destination = %dest.display(),
                error = %e,
                "result copy failed"
            );
            SaveOutcome::Failed(format!("copy to {} failed: {e}", dest.display()))
        }
    }
}
