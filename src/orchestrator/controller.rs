//! Bridge request loop.
//!
//! Serves requests from the presentation layer one at a time, which is what
//! keeps the shell to a single running job.

use super::jobs::Orchestrator;
use super::save::DestinationPrompt;
use crate::bridge::BridgeRequest;
use tokio::sync::mpsc::UnboundedReceiver;

/// Serve bridge requests until every [`Bridge`](crate::bridge::Bridge) is dropped.
pub(crate) async fn serve_bridge<P: DestinationPrompt>(
    orchestrator: &mut Orchestrator,
    prompt: &P,
    mut requests: UnboundedReceiver<BridgeRequest>,
) {
    while let Some(request) = requests.recv().await {
        match request {
            BridgeRequest::RunProgram {
                file_path,
                format_hint,
                mut reply,
            } => {
                // Nobody can cancel a job, but if the presentation side goes
                // away the job future is dropped and the engine is killed.
                let outcome = tokio::select! {
                    outcome = orchestrator.run_job(&file_path, &format_hint) => Some(outcome),
                    _ = reply.closed() => None,
                };
                match outcome {
                    Some(outcome) => {
                        let _ = reply.send(outcome);
                    }
                    None => {
                        tracing::info!(input = %file_path.display(), "presentation closed; abandoning job");
                    }
                }
            }
            BridgeRequest::SaveFile { reply } => {
                let destination = orchestrator.save_result(prompt).await;
                let _ = reply.send(destination);
            }
        }
    }
    tracing::debug!("bridge closed");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::bridge::{self, ShellEvent};
    use crate::model::{FormatToken, JobOutcome};
    use crate::orchestrator::jobs::tests::{checkout_with_engine, COPYING_ENGINE, FAILING_ENGINE};
    use crate::orchestrator::{ChannelPrompt, FixedDestination};
    use std::path::PathBuf;

    #[tokio::test]
    async fn csv_job_runs_and_saves_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        let input = tmp.path().join("patients.csv");
        std::fs::write(&input, b"id,family_name\n1,Smith\n2,Smith\n").unwrap();
        let dest = tmp.path().join("out.xlsx");

        assert_eq!(crate::format::classify("patients.csv"), FormatToken::Csv);

        let (bridge, requests) = bridge::channel();
        let mut orch = Orchestrator::new(paths.clone(), None);
        let prompt = FixedDestination(Some(dest.clone()));
        let server = async { serve_bridge(&mut orch, &prompt, requests).await };
        let client = async {
            let outcome = bridge
                .run_program(&input.display().to_string(), "")
                .await
                .unwrap();
            assert!(outcome.is_success());
            let saved = bridge.save_file().await.unwrap();
            drop(bridge);
            saved
        };
        let (_, saved) = tokio::join!(server, client);

        assert_eq!(saved, Some(dest.clone()));
        let body = std::fs::read(&dest).unwrap();
        assert!(!body.is_empty());
        assert_eq!(body, std::fs::read(paths.result_file(FormatToken::Csv)).unwrap());
    }

    #[tokio::test]
    async fn failing_job_leaves_no_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), FAILING_ENGINE);
        let input = tmp.path().join("notes.txt");
        std::fs::write(&input, b"free text").unwrap();
        let expected_output = paths.result_file(FormatToken::Test);

        let (bridge, requests) = bridge::channel();
        let mut orch = Orchestrator::new(paths, None);
        let prompt = FixedDestination(Some(tmp.path().join("out.xlsx")));
        let server = async { serve_bridge(&mut orch, &prompt, requests).await };
        let client = async {
            let outcome = bridge
                .run_program(&input.display().to_string(), "")
                .await
                .unwrap();
            let saved = bridge.save_file().await.unwrap();
            drop(bridge);
            (outcome, saved)
        };
        let (_, (outcome, saved)) = tokio::join!(server, client);

        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        assert_eq!(saved, None);
        assert!(!expected_output.exists());
        assert!(!tmp.path().join("out.xlsx").exists());
    }

    #[tokio::test]
    async fn save_prompt_goes_through_presentation_events() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = checkout_with_engine(tmp.path(), COPYING_ENGINE);
        let input = tmp.path().join("patients.csv");
        std::fs::write(&input, b"id\n1\n").unwrap();
        let dest = tmp.path().join("chosen.xlsx");

        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
        let (bridge, requests) = bridge::channel();
        let mut orch = Orchestrator::new(paths, Some(event_tx.clone()));
        let prompt = ChannelPrompt::new(event_tx);
        let server = async { serve_bridge(&mut orch, &prompt, requests).await };
        let client = async {
            assert!(bridge
                .run_program(&input.display().to_string(), "CSV")
                .await
                .unwrap()
                .is_success());
            let mut pending = bridge.save_file();
            let mut default_seen: Option<PathBuf> = None;
            let saved = loop {
                tokio::select! {
                    saved = &mut pending => break saved.unwrap(),
                    Some(ev) = event_rx.recv() => {
                        if let ShellEvent::DestinationRequested { default_path, reply } = ev {
                            default_seen = Some(default_path);
                            let _ = reply.send(Some(dest.clone()));
                        }
                    }
                }
            };
            drop(bridge);
            (saved, default_seen)
        };
        let (_, (saved, default_seen)) = tokio::join!(server, client);

        assert_eq!(saved, Some(dest.clone()));
        assert!(default_seen
            .unwrap()
            .ends_with("deduped_record_mapping_CSV.xlsx"));
        assert!(dest.exists());
    }
}
