use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Base name of the artifact the engine writes; suffixed with the format token.
pub const RESULTS_FILE_NAME: &str = "deduped_record_mapping";

/// Extension the engine uses to pick its spreadsheet writer.
pub const RESULTS_FILE_EXT: &str = "xlsx";

/// Upload types the presentation layer accepts.
pub const ACCEPTED_UPLOAD_EXTENSIONS: &[&str] = &["json", "csv"];

/// Whether the shell runs from an installed bundle or a development checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    Packaged,
    Development,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Packaged => f.write_str("packaged"),
            DeploymentMode::Development => f.write_str("development"),
        }
    }
}

/// Format tokens the engine accepts after `--fmt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatToken {
    Csv,
    Fhir,
    /// Generic/unstructured input; the engine treats it as test data.
    Test,
}

impl FormatToken {
    /// Token as passed on the engine command line.
    pub fn as_arg(self) -> &'static str {
        match self {
            FormatToken::Csv => "CSV",
            FormatToken::Fhir => "FHIR",
            FormatToken::Test => "TEST",
        }
    }
}

impl fmt::Display for FormatToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One deduplication request, owned by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub input_path: PathBuf,
    pub format: FormatToken,
    pub output_path: PathBuf,
    pub status: JobStatus,
    pub submitted_at: String,
}

/// Fully resolved description of how to launch the engine for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub program: PathBuf,
    pub working_dir: PathBuf,
    pub args: Vec<String>,
}

/// Terminal outcome of a job, as reported across the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded {
        output_path: PathBuf,
        #[serde(default)]
        diagnostics: String,
    },
    Failed {
        reason: String,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Succeeded { .. } => JobStatus::Succeeded,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// The file produced by the most recent successful job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
    pub path: PathBuf,
    pub format: FormatToken,
}

/// Structured info events emitted by the orchestrator and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Message(String),
    EngineLaunched { format: FormatToken, input: PathBuf },
    EngineExited { code: Option<i32> },
    ArtifactSaved { path: PathBuf },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::EngineLaunched { format, input } => {
                format!("Deduplicating {} as {}", input.display(), format)
            }
            InfoEvent::EngineExited { code: Some(code) } => {
                format!("Engine exited with status {code}")
            }
            InfoEvent::EngineExited { code: None } => "Engine terminated by signal".to_string(),
            InfoEvent::ArtifactSaved { path } => format!("Saved: {}", path.display()),
        }
    }
}

/// Current UTC time as RFC 3339, used for job timestamps.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}
