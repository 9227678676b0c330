//! Privileged job state: runs the engine and remembers the last good result.

use super::save::{self, DestinationPrompt, SaveOutcome};
use crate::bridge::ShellEvent;
use crate::engine::JobRunner;
use crate::model::{
    now_rfc3339, FormatToken, InfoEvent, Job, JobOutcome, JobStatus, ResultArtifact,
};
use crate::paths::ResolvedPaths;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

/// The most recent job that succeeded. Only successful jobs are kept here,
/// so a failed run can never expose a stale artifact.
#[derive(Debug, Clone)]
pub struct CurrentJob {
    pub job: Job,
}

pub struct Orchestrator {
    runner: JobRunner,
    current: Option<CurrentJob>,
    events: Option<UnboundedSender<ShellEvent>>,
}

impl Orchestrator {
    pub fn new(paths: ResolvedPaths, events: Option<UnboundedSender<ShellEvent>>) -> Self {
        Self {
            runner: JobRunner::new(paths),
            current: None,
            events,
        }
    }

    pub fn paths(&self) -> &ResolvedPaths {
        self.runner.paths()
    }

    fn emit(&self, info: InfoEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(ShellEvent::Info(info));
        }
    }

    /// Build a pending job. The output path is fixed here, before any spawn.
    pub fn prepare_job(&self, input_path: &Path, format: FormatToken) -> Job {
        Job {
            input_path: input_path.to_path_buf(),
            format,
            output_path: self.paths().result_file(format),
            status: JobStatus::Pending,
            submitted_at: now_rfc3339(),
        }
    }

    /// Run one job to a terminal outcome.
    pub async fn run_job(&mut self, input_path: &Path, format_hint: &str) -> JobOutcome {
        self.current = None;

        let format = FormatToken::from_hint(format_hint, &input_path.to_string_lossy());
        let mut job = self.prepare_job(input_path, format);

        // The output slot is shared across jobs of the same format.
        match tokio::fs::remove_file(&job.output_path).await {
            Ok(()) => {
                tracing::debug!(output = %job.output_path.display(), "removed previous artifact")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(output = %job.output_path.display(), error = %e, "could not remove previous artifact");
                return JobOutcome::Failed {
                    reason: format!(
                        "could not remove previous result {}: {e}",
                        job.output_path.display()
                    ),
                };
            }
        }

        tracing::info!(
            job.input = %job.input_path.display(),
            format = %job.format,
            output = %job.output_path.display(),
            "job started"
        );
        self.emit(InfoEvent::EngineLaunched {
            format,
            input: job.input_path.clone(),
        });
        job.status = JobStatus::Running;

        let run = self.runner.run(&job).await;
        job.status = run.outcome.status();
        self.emit(InfoEvent::EngineExited {
            code: run.exit_code,
        });
        tracing::info!(
            job.input = %job.input_path.display(),
            status = ?job.status,
            exit_code = ?run.exit_code,
            "job finished"
        );

        if run.outcome.is_success() {
            self.current = Some(CurrentJob { job });
        }
        run.outcome
    }

    /// Artifact of the last successful job. The path is recomputed from the
    /// job's format rather than read back from the job.
    pub fn artifact(&self) -> Option<ResultArtifact> {
        self.current.as_ref().map(|c| ResultArtifact {
            path: self.paths().result_file(c.job.format),
            format: c.job.format,
        })
    }

    pub async fn save_result<P: DestinationPrompt>(&self, prompt: &P) -> Option<PathBuf> {
        self.save_result_detailed(prompt).await.into_destination()
    }

    pub async fn save_result_detailed<P: DestinationPrompt>(&self, prompt: &P) -> SaveOutcome {
        let Some(artifact) = self.artifact() else {
            tracing::warn!("save requested before any job succeeded");
            return self.save_failed("No completed job to save".into());
        };
        if !tokio::fs::try_exists(&artifact.path).await.unwrap_or(false) {
            tracing::warn!(source = %artifact.path.display(), "result artifact missing");
            return self.save_failed(format!(
                "Result file {} does not exist",
                artifact.path.display()
            ));
        }

        let default_path = self.paths().default_save_path(artifact.format);
        let Some(dest) = prompt.choose(&default_path).await else {
            tracing::info!("save cancelled");
            self.emit(InfoEvent::Message("Save cancelled".into()));
            return SaveOutcome::Cancelled;
        };

        let outcome = save::copy_artifact(&artifact, &dest).await;
        match &outcome {
            SaveOutcome::Saved(path) => self.emit(InfoEvent::ArtifactSaved { path: path.clone() }),
            SaveOutcome::Failed(reason) => self.emit(InfoEvent::Message(reason.clone())),
            SaveOutcome::Cancelled => {}
        }
        outcome
    }

    fn save_failed(&self, reason: String) -> SaveOutcome {
        self.emit(InfoEvent::Message(reason.clone()));
        SaveOutcome::Failed(reason)
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use crate::model::DeploymentMode;
    use crate::orchestrator::FixedDestination;
    use crate::paths::{resolve_paths, PathRoots};
    use std::time::Duration;

    // The fake interpreter is /bin/sh, so the entry script sees
    // `dedupe-data --fmt <TOKEN> <input> <output>` as $1..$5.
    pub(crate) const COPYING_ENGINE: &str = "echo \"deduping $4 as $3\"\ncp \"$4\" \"$5\"\n";
    pub(crate) const FAILING_ENGINE: &str = "echo \"bad input $4\" >&2\nexit 1\n";

    /// Development-mode checkout whose `.venv/bin/python3` runs `engine`
    /// as the entry script.
    pub(crate) fn checkout_with_engine(root: &Path, engine: &str) -> ResolvedPaths {
        let roots = PathRoots {
            resources_dir: root.join("resources"),
            project_root: root.join("checkout"),
            user_data_dir: root.join("data"),
            save_dir: root.join("downloads"),
        };
        let bin = roots.project_root.join(".venv/bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(roots.project_root.join("cli")).unwrap();
        std::os::unix::fs::symlink("/bin/sh", bin.join("python3")).unwrap();
        let paths = resolve_paths(DeploymentMode::Development, &roots).unwrap();
        std::fs::write(paths.engine.script(), engine).unwrap();
        paths
    }

    fn input_file(root: &Path, name: &str, body: &[u8]) -> PathBuf {
        let path = root.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn success_echoes_precomputed_output_path() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        let mut orch = Orchestrator::new(paths, None);
        let input = input_file(tmp.path(), "patients.csv", b"id,name\n1,Ann\n");

        let expected = orch.prepare_job(&input, FormatToken::Csv).output_path;
        let outcome = orch.run_job(&input, "").await;
        match outcome {
            JobOutcome::Succeeded {
                output_path,
                diagnostics,
            } => {
                assert_eq!(output_path, expected);
                assert!(diagnostics.contains("as CSV"));
            }
            other => panic!("expected success, got {other:?}"),
        }
        assert_eq!(orch.artifact().unwrap().path, expected);
    }

    #[tokio::test]
    async fn failure_discards_previous_result() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        let script = paths.engine.script();
        let mut orch = Orchestrator::new(paths, None);
        let input = input_file(tmp.path(), "patients.csv", b"id\n1\n");

        assert!(orch.run_job(&input, "CSV").await.is_success());
        let stale = orch.artifact().unwrap().path;
        assert!(stale.exists());

        std::fs::write(&script, FAILING_ENGINE).unwrap();
        let outcome = orch.run_job(&input, "CSV").await;
        match &outcome {
            JobOutcome::Failed { reason } => assert!(reason.contains("bad input")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(orch.artifact().is_none());
        assert!(!stale.exists());

        let dest = tmp.path().join("out.xlsx");
        let saved = orch
            .save_result(&FixedDestination(Some(dest.clone())))
            .await;
        assert_eq!(saved, None);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn undeletable_previous_result_fails_before_launch() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        // A directory in the output slot cannot be removed with remove_file.
        let slot = paths.result_file(FormatToken::Csv);
        std::fs::create_dir_all(&slot).unwrap();
        let mut orch = Orchestrator::new(paths, None);
        let input = input_file(tmp.path(), "patients.csv", b"id\n1\n");

        let outcome = orch.run_job(&input, "CSV").await;
        match &outcome {
            JobOutcome::Failed { reason } => assert!(reason.contains("previous result")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(orch.artifact().is_none());
        // The engine never ran, so nothing was copied into the slot.
        assert_eq!(std::fs::read_dir(&slot).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn clean_exit_without_output_leaves_nothing_to_save() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), "echo ok\nexit 0\n");
        let mut orch = Orchestrator::new(paths, None);
        let input = input_file(tmp.path(), "patients.csv", b"id\n1\n");

        assert!(orch.run_job(&input, "").await.is_success());

        let dest = tmp.path().join("out.xlsx");
        let saved = orch
            .save_result(&FixedDestination(Some(dest.clone())))
            .await;
        assert_eq!(saved, None);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn missing_interpreter_fails_without_panicking() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        std::fs::remove_file(&paths.engine.interpreter).unwrap();
        let mut orch = Orchestrator::new(paths, None);

        let outcome = orch.run_job(Path::new("/nope.csv"), "").await;
        match outcome {
            JobOutcome::Failed { reason } => assert!(reason.contains("failed to start engine")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_save_copies_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        let mut orch = Orchestrator::new(paths, None);
        let input = input_file(tmp.path(), "patients.csv", b"id\n1\n");
        assert!(orch.run_job(&input, "").await.is_success());

        let source = orch.artifact().unwrap().path;
        let before = std::fs::metadata(&source).unwrap().modified().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let outcome = orch.save_result_detailed(&FixedDestination(None)).await;
        assert_eq!(outcome, SaveOutcome::Cancelled);
        let after = std::fs::metadata(&source).unwrap().modified().unwrap();
        assert_eq!(before, after);
        let saved: Vec<_> = std::fs::read_dir(tmp.path().join("checkout"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path() != source && e.path().is_file())
            .collect();
        assert!(saved.is_empty());
    }

    #[tokio::test]
    async fn repeated_saves_copy_same_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        let mut orch = Orchestrator::new(paths, None);
        let input = input_file(tmp.path(), "bundle.xml", b"<Bundle/>");
        assert!(orch.run_job(&input, "auto").await.is_success());
        assert_eq!(orch.artifact().unwrap().format, FormatToken::Fhir);

        for name in ["first.xlsx", "second.xlsx"] {
            let dest = tmp.path().join(name);
            let saved = orch
                .save_result(&FixedDestination(Some(dest.clone())))
                .await;
            assert_eq!(saved, Some(dest.clone()));
            assert_eq!(std::fs::read(&dest).unwrap(), b"<Bundle/>");
        }
        assert_eq!(
            std::fs::read(orch.artifact().unwrap().path).unwrap(),
            b"<Bundle/>"
        );
    }

    #[tokio::test]
    async fn prompt_receives_default_save_path() {
        struct Recording(std::sync::Mutex<Option<PathBuf>>);
        impl DestinationPrompt for Recording {
            fn choose(
                &self,
                default_path: &Path,
            ) -> impl std::future::Future<Output = Option<PathBuf>> + Send {
                *self.0.lock().unwrap() = Some(default_path.to_path_buf());
                async { None }
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        let expected = paths.default_save_path(FormatToken::Test);
        let mut orch = Orchestrator::new(paths, None);
        let input = input_file(tmp.path(), "records.json", b"{}");
        assert!(orch.run_job(&input, "").await.is_success());

        let prompt = Recording(std::sync::Mutex::new(None));
        assert_eq!(orch.save_result(&prompt).await, None);
        assert_eq!(prompt.0.lock().unwrap().clone(), Some(expected));
    }

    #[tokio::test]
    async fn emits_progress_events() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), FAILING_ENGINE);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut orch = Orchestrator::new(paths, Some(tx));

        orch.run_job(Path::new("/tmp/notes.txt"), "").await;
        let mut messages = Vec::new();
        while let Ok(ShellEvent::Info(info)) = rx.try_recv() {
            messages.push(info.to_message());
        }
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("as TEST"));
        assert_eq!(messages[1], "Engine exited with status 1");
    }
}
