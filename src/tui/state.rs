use crate::bridge::{FileHandle, Pending};
use crate::model::JobOutcome;
use crate::presentation::{FormatChoice, Presentation};
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Destination prompt opened by the orchestrator's save flow.
pub struct SavePrompt {
    pub input: String,
    pub reply: oneshot::Sender<Option<PathBuf>>,
}

impl SavePrompt {
    /// Send the answer; an empty input counts as cancel.
    pub fn answer(self, confirmed: bool) {
        let trimmed = self.input.trim();
        let choice = if confirmed && !trimmed.is_empty() {
            Some(PathBuf::from(trimmed))
        } else {
            None
        };
        let _ = self.reply.send(choice);
    }
}

/// Everything the UI thread owns. Nothing here is shared across threads.
pub struct UiState {
    pub presentation: Presentation,
    pub file_input: String,
    pub format: FormatChoice,
    pub info: String,
    pub show_help: bool,
    pub spinner: usize,

    pub prompt: Option<SavePrompt>,
    pub pending_job: Option<Pending<JobOutcome>>,
    pub pending_save: Option<Pending<Option<PathBuf>>>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            presentation: Presentation::new(),
            file_input: String::new(),
            format: FormatChoice::default(),
            info: String::new(),
            show_help: false,
            spinner: 0,
            prompt: None,
            pending_job: None,
            pending_save: None,
        }
    }
}

impl UiState {
    pub fn file_handle(&self) -> FileHandle {
        FileHandle::new(self.file_input.clone())
    }

    /// Whether keystrokes go to a text field rather than to shortcuts.
    pub fn is_editing(&self) -> bool {
        self.prompt.is_some() || self.presentation.view() == crate::presentation::View::Initial
    }

    pub fn reset_form(&mut self) {
        self.file_input.clear();
        self.format = FormatChoice::default();
    }
}
