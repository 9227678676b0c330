//! Child process supervision with combined output capture.

use crate::model::EngineInvocation;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::process::Command;

/// How long to keep reading after the engine exits. Grandchildren that
/// inherited the pipes can hold them open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

pub(crate) struct ProcessReport {
    pub status: ExitStatus,
    /// stdout and stderr interleaved in arrival order, one line per line.
    pub output: String,
}

/// Spawn `inv` and wait for it to exit, draining both pipes concurrently.
///
/// Completion is driven by the child's exit, not by EOF on its pipes. The
/// child is killed if the returned future is dropped before completion.
pub(crate) async fn run_captured(inv: &EngineInvocation) -> std::io::Result<ProcessReport> {
    let mut child = Command::new(&inv.program)
        .args(&inv.args)
        .current_dir(&inv.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
    let stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));
    let mut output = String::new();
    let status = {
        let collect = collect_combined(stdout, stderr, &mut output);
        tokio::pin!(collect);

        let mut drained = false;
        let status = tokio::select! {
            status = child.wait() => status?,
            () = &mut collect => {
                drained = true;
                child.wait().await?
            }
        };
        if !drained && tokio::time::timeout(OUTPUT_DRAIN_GRACE, &mut collect).await.is_err() {
            tracing::debug!("engine exited with its output pipes still held open");
        }
        status
    };

    Ok(ProcessReport { status, output })
}

async fn next_segment<R: AsyncBufRead + Unpin>(lines: &mut Option<Split<R>>) -> Option<String> {
    let lines = lines.as_mut()?;
    match lines.next_segment().await {
        Ok(Some(bytes)) => {
            let line = String::from_utf8_lossy(&bytes);
            Some(line.trim_end_matches('\r').to_string())
        }
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(error = %e, "engine pipe read failed");
            None
        }
    }
}

async fn collect_combined<O, E>(
    mut stdout: Option<Split<O>>,
    mut stderr: Option<Split<E>>,
    combined: &mut String,
) where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    loop {
        tokio::select! {
            line = next_segment(&mut stdout), if stdout.is_some() => match line {
                Some(line) => {
                    tracing::debug!(stream = "stdout", "{line}");
                    combined.push_str(&line);
                    combined.push('\n');
                }
                None => stdout = None,
            },
            line = next_segment(&mut stderr), if stderr.is_some() => match line {
                Some(line) => {
                    tracing::debug!(stream = "stderr", "{line}");
                    combined.push_str(&line);
                    combined.push('\n');
                }
                None => stderr = None,
            },
            else => break,
        }
    }
}
