mod process;

use crate::model::{EngineInvocation, Job, JobOutcome};
use crate::paths::ResolvedPaths;

/// Subcommand the engine CLI exposes for deduplication.
pub const DEDUPE_COMMAND: &str = "dedupe-data";
/// Flag preceding the format token.
pub const FORMAT_FLAG: &str = "--fmt";

/// Outcome of one engine run plus the raw exit code, if any.
#[derive(Debug)]
pub struct EngineRun {
    pub outcome: JobOutcome,
    pub exit_code: Option<i32>,
}

/// Runs the external dedupe engine for a single job.
pub struct JobRunner {
    paths: ResolvedPaths,
}

impl JobRunner {
    pub fn new(paths: ResolvedPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    /// Build the command line for `job`.
    ///
    /// The engine is bound to this exact shape:
    /// `<script> dedupe-data --fmt <TOKEN> <input> <output>`.
    pub fn invocation(&self, job: &Job) -> EngineInvocation {
        let args = vec![
            self.paths.engine.script().display().to_string(),
            DEDUPE_COMMAND.to_string(),
            FORMAT_FLAG.to_string(),
            job.format.as_arg().to_string(),
            job.input_path.display().to_string(),
            job.output_path.display().to_string(),
        ];
        EngineInvocation {
            program: self.paths.engine.interpreter.clone(),
            working_dir: self.paths.work_dir.clone(),
            args,
        }
    }

    /// Run the engine to completion. Failures are terminal; nothing is retried.
    pub async fn run(&self, job: &Job) -> EngineRun {
        let inv = self.invocation(job);
        tracing::info!(
            program = %inv.program.display(),
            cwd = %inv.working_dir.display(),
            args = ?inv.args,
            "launching engine"
        );

        match process::run_captured(&inv).await {
            Ok(report) if report.status.success() => EngineRun {
                outcome: JobOutcome::Succeeded {
                    output_path: job.output_path.clone(),
                    diagnostics: report.output,
                },
                exit_code: report.status.code(),
            },
            Ok(report) => {
                let exit_code = report.status.code();
                tracing::warn!(?exit_code, output = %report.output, "engine failed");
                let reason = if report.output.trim().is_empty() {
                    match exit_code {
                        Some(code) => format!("engine exited with status {code}"),
                        None => "engine terminated by signal".to_string(),
                    }
                } else {
                    report.output
                };
                EngineRun {
                    outcome: JobOutcome::Failed { reason },
                    exit_code,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, program = %inv.program.display(), "engine spawn failed");
                EngineRun {
                    outcome: JobOutcome::Failed {
                        reason: format!("failed to start engine {}: {e}", inv.program.display()),
                    },
                    exit_code: None,
                }
            }
        }
    }
}
