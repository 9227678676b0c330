use crate::bridge::{self, FileHandle, Pending, ShellEvent};
use crate::logging::{self, LogTarget};
use crate::model::{DeploymentMode, JobOutcome};
use crate::orchestrator::{self, FixedDestination, Orchestrator};
use crate::paths::{self, PathRoots, ResolvedPaths};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Packaged if a resources directory sits next to the executable
    Auto,
    Packaged,
    Development,
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "deduplifhir-shell",
    version,
    about = "Run the DedupliFHIR deduplication engine on patient records"
)]
pub struct Cli {
    /// Deployment mode used to locate the engine
    #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Bundled resources directory (packaged mode)
    #[arg(long)]
    pub resources_dir: Option<PathBuf>,

    /// Checkout root holding .venv/ and cli/ (development mode)
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Application data directory for results and logs
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Deduplicate this file and exit (no TUI)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Format hint for --input: CSV, FHIR or TEST (default: by extension)
    #[arg(long, requires = "input")]
    pub fmt: Option<String>,

    /// Copy the result here after a successful --input run
    #[arg(long, requires = "input")]
    pub save_to: Option<PathBuf>,

    /// Print the job outcome as JSON (with --input)
    #[arg(long, requires = "input")]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Enable info logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log file for interactive mode
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    fn user_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(paths::default_user_data_dir)
    }

    fn log_target(&self) -> LogTarget {
        if self.input.is_some() {
            return LogTarget::Stderr;
        }
        match &self.log_file {
            Some(p) => LogTarget::File(p.clone()),
            None => LogTarget::File(logging::default_log_file(&self.user_data_dir())),
        }
    }
}

/// Resolve every mode-dependent path once. Fails when no engine can be found.
pub fn resolve(args: &Cli) -> Result<ResolvedPaths> {
    let roots = PathRoots::discover(
        args.resources_dir.clone(),
        args.project_root.clone(),
        Some(args.user_data_dir()),
    )
    .context("resolve application directories")?;

    let mode = match args.mode {
        ModeArg::Auto => paths::detect_mode(&roots),
        ModeArg::Packaged => DeploymentMode::Packaged,
        ModeArg::Development => DeploymentMode::Development,
    };
    let resolved = paths::resolve_paths(mode, &roots)?;

    std::fs::create_dir_all(&resolved.output_dir).with_context(|| {
        format!(
            "create output directory {}",
            resolved.output_dir.display()
        )
    })?;

    tracing::info!(
        mode = %resolved.mode,
        interpreter = %resolved.engine.interpreter.display(),
        work_dir = %resolved.work_dir.display(),
        output_dir = %resolved.output_dir.display(),
        "engine located"
    );
    Ok(resolved)
}

/// Returns `Ok(false)` when the run finished but the job or save failed.
pub async fn run(args: Cli) -> Result<bool> {
    logging::init(&args.log_target(), args.debug, args.verbose)?;

    let paths = match resolve(&args) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "cannot start without the dedupe engine");
            return Err(e);
        }
    };

    if let Some(input) = args.input.clone() {
        return run_headless(&args, paths, input).await;
    }

    #[cfg(feature = "tui")]
    let res = crate::tui::run(paths).await.map(|()| true);
    #[cfg(not(feature = "tui"))]
    let res = {
        let _ = paths;
        Err(anyhow::anyhow!(
            "built without TUI support; pass --input <FILE> to run a job"
        ))
    };
    res
}

/// Await a bridge reply while echoing orchestrator events to stderr.
async fn await_forwarding<T>(
    mut pending: Pending<T>,
    events: &mut UnboundedReceiver<ShellEvent>,
    out_tx: &UnboundedSender<OutputLine>,
) -> Result<T> {
    let res = loop {
        tokio::select! {
            res = &mut pending => break res,
            Some(ev) = events.recv() => forward_event(ev, out_tx),
        }
    };
    while let Ok(ev) = events.try_recv() {
        forward_event(ev, out_tx);
    }
    res.context("orchestrator stopped before replying")
}

fn forward_event(ev: ShellEvent, out_tx: &UnboundedSender<OutputLine>) {
    match ev {
        ShellEvent::Info(info) => {
            let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
        }
        // FixedDestination answers prompts itself; nothing should ask here.
        ShellEvent::DestinationRequested { reply, .. } => {
            let _ = reply.send(None);
        }
    }
}

async fn run_headless(args: &Cli, paths: ResolvedPaths, input: PathBuf) -> Result<bool> {
    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ShellEvent>();
    let (bridge, requests) = bridge::channel();

    let prompt = FixedDestination(args.save_to.clone());
    let mut orchestrator = Orchestrator::new(paths, Some(event_tx));
    let server = orchestrator::serve_bridge(&mut orchestrator, &prompt, requests);

    let format_hint = args.fmt.clone().unwrap_or_default();
    let save_requested = args.save_to.is_some();
    let json = args.json;
    let client_out = out_tx.clone();
    let client = async move {
        let file = bridge.path_for_file(&FileHandle::new(input.display().to_string()));
        let outcome = await_forwarding(
            bridge.run_program(&file, &format_hint),
            &mut event_rx,
            &client_out,
        )
        .await?;

        let saved = if outcome.is_success() && save_requested {
            Some(await_forwarding(bridge.save_file(), &mut event_rx, &client_out).await?)
        } else {
            None
        };
        drop(bridge);
        Ok::<_, anyhow::Error>((outcome, saved))
    };

    let ((), res) = tokio::join!(server, client);
    let (outcome, saved) = res?;

    if json {
        let out = serde_json::to_string_pretty(&outcome)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        match &outcome {
            JobOutcome::Succeeded { output_path, .. } => {
                let _ = out_tx.send(OutputLine::Stdout(format!(
                    "Results ready: {}",
                    output_path.display()
                )));
            }
            JobOutcome::Failed { reason } => {
                let _ = out_tx.send(OutputLine::Stdout("Deduplication failed:".to_string()));
                for line in reason.lines() {
                    let _ = out_tx.send(OutputLine::Stdout(format!("  {line}")));
                }
            }
        }
    }

    let save_ok = match saved {
        None => true,
        Some(Some(_)) => true,
        Some(None) => {
            let _ = out_tx.send(OutputLine::Stderr(
                "Results file failed to save.".to_string(),
            ));
            false
        }
    };

    drop(out_tx);
    let _ = out_handle.await;
    Ok(outcome.is_success() && save_ok)
}
