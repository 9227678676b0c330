//! Presentation state machine.
//!
//! Holds no system capability: it only records what the user did and what the
//! bridge answered, and decides which view and banners are visible.

use crate::bridge::FileHandle;
use crate::format;
use crate::model::{FormatToken, JobOutcome};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// No file submitted yet.
    Initial,
    /// File chosen and validated, not yet dispatched.
    Submitted,
    /// Job in flight; only the job outcome can leave this view.
    Running,
    Succeeded,
    Failed,
}

/// Format choice offered by the upload form. `Auto` lets the orchestrator
/// classify by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatChoice {
    #[default]
    Auto,
    Csv,
    Fhir,
    Test,
}

impl FormatChoice {
    pub fn next(self) -> Self {
        match self {
            FormatChoice::Auto => FormatChoice::Csv,
            FormatChoice::Csv => FormatChoice::Fhir,
            FormatChoice::Fhir => FormatChoice::Test,
            FormatChoice::Test => FormatChoice::Auto,
        }
    }

    /// Hint string sent across the bridge.
    pub fn as_hint(self) -> &'static str {
        match self {
            FormatChoice::Auto => "",
            FormatChoice::Csv => "CSV",
            FormatChoice::Fhir => "FHIR",
            FormatChoice::Test => "TEST",
        }
    }

    /// Engine format this choice produces for `file_name`. Under `Auto` a
    /// `.json` upload runs as TEST, since only `.xml` classifies as FHIR.
    pub fn resolve(self, file_name: &str) -> FormatToken {
        FormatToken::from_hint(self.as_hint(), file_name)
    }

    pub fn label(self) -> &'static str {
        match self {
            FormatChoice::Auto => "Auto-detect",
            FormatChoice::Csv => "CSV",
            FormatChoice::Fhir => "FHIR",
            FormatChoice::Test => "Test data",
        }
    }
}

/// Inline validation banner on the upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormBanner {
    FileMissing,
    UnsupportedType(String),
}

impl FormBanner {
    pub fn message(&self) -> String {
        match self {
            FormBanner::FileMissing => "File not found. Please upload a file.".to_string(),
            FormBanner::UnsupportedType(name) => {
                format!("{name} is not a supported file. Upload a .json or .csv file.")
            }
        }
    }
}

/// Save status shown on the results view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveBanner {
    Saved(PathBuf),
    SaveFailed,
}

/// A validated submission, ready to be sent as `run_program`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub file: FileHandle,
    pub format_hint: &'static str,
}

#[derive(Debug, Clone)]
pub struct Presentation {
    view: View,
    form_banner: Option<FormBanner>,
    save_banner: Option<SaveBanner>,
    saving: bool,
    failure_reason: Option<String>,
    result_path: Option<PathBuf>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new()
    }
}

impl Presentation {
    pub fn new() -> Self {
        Self {
            view: View::Initial,
            form_banner: None,
            save_banner: None,
            saving: false,
            failure_reason: None,
            result_path: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn form_banner(&self) -> Option<&FormBanner> {
        self.form_banner.as_ref()
    }

    pub fn save_banner(&self) -> Option<&SaveBanner> {
        self.save_banner.as_ref()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn result_path(&self) -> Option<&PathBuf> {
        self.result_path.as_ref()
    }

    /// Validate the upload form. On success the view moves to `Submitted`
    /// and the caller dispatches the returned submission.
    pub fn submit(&mut self, file: &FileHandle, format: FormatChoice) -> Option<Submission> {
        if self.view != View::Initial {
            return None;
        }
        if file.is_empty() {
            self.form_banner = Some(FormBanner::FileMissing);
            return None;
        }
        if !format::is_accepted_upload(file.name()) {
            self.form_banner = Some(FormBanner::UnsupportedType(file.name().to_string()));
            return None;
        }
        self.form_banner = None;
        self.view = View::Submitted;
        Some(Submission {
            file: file.clone(),
            format_hint: format.as_hint(),
        })
    }

    /// The submission has been sent to the orchestrator.
    pub fn mark_running(&mut self) {
        if self.view == View::Submitted {
            self.view = View::Running;
        }
    }

    /// Apply the job outcome. Ignored unless a job is running.
    pub fn on_job_outcome(&mut self, outcome: &JobOutcome) {
        if self.view != View::Running {
            tracing::debug!(view = ?self.view, "ignoring job outcome outside Running");
            return;
        }
        match outcome {
            JobOutcome::Succeeded { output_path, .. } => {
                self.view = View::Succeeded;
                self.result_path = Some(output_path.clone());
                self.failure_reason = None;
            }
            JobOutcome::Failed { reason } => {
                self.view = View::Failed;
                self.result_path = None;
                self.failure_reason = Some(reason.clone());
            }
        }
        self.save_banner = None;
        self.saving = false;
    }

    /// Start a save. Returns false when a save is not possible right now.
    pub fn begin_save(&mut self) -> bool {
        if self.view != View::Succeeded || self.saving {
            return false;
        }
        self.saving = true;
        true
    }

    /// Apply the save result; the view stays `Succeeded` either way.
    pub fn on_save_result(&mut self, destination: Option<PathBuf>) {
        if self.view != View::Succeeded {
            return;
        }
        self.saving = false;
        self.save_banner = Some(match destination {
            Some(path) => SaveBanner::Saved(path),
            None => SaveBanner::SaveFailed,
        });
    }

    /// Explicit "return home" from a finished job.
    pub fn return_home(&mut self) -> bool {
        if !matches!(self.view, View::Succeeded | View::Failed) || self.saving {
            return false;
        }
        *self = Self::new();
        true
    }
}
