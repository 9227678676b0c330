mod clipboard;
mod help;
mod state;
mod views;

use crate::bridge::{self, Bridge, ShellEvent};
use crate::orchestrator::{self, ChannelPrompt, Orchestrator};
use crate::paths::ResolvedPaths;
use crate::presentation::View;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use state::{SavePrompt, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot::error::TryRecvError;

pub async fn run(paths: ResolvedPaths) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ShellEvent>();
    let (bridge, requests) = bridge::channel();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    // It only receives the bridge; the orchestrator stays on this side.
    let ui_handle = std::thread::spawn(move || run_threaded(bridge, event_rx));

    let prompt = ChannelPrompt::new(event_tx.clone());
    let mut orchestrator = Orchestrator::new(paths, Some(event_tx));
    orchestrator::serve_bridge(&mut orchestrator, &prompt, requests).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(res) => res?,
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }
    Ok(())
}

/// Run the TUI loop on a dedicated thread. Returning drops the bridge, which
/// stops the orchestrator loop.
pub fn run_threaded(bridge: Bridge, mut event_rx: UnboundedReceiver<ShellEvent>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }
        poll_pending(&mut state);

        if last_tick.elapsed() >= tick_rate {
            state.spinner = state.spinner.wrapping_add(1);
            terminal.draw(|f| views::draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, &bridge, k) == KeyAction::Quit {
                    break Ok(());
                }
            }
        }
    };

    // Answer an open prompt so the orchestrator is not left waiting.
    if let Some(prompt) = state.prompt.take() {
        prompt.answer(false);
    }

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn apply_event(state: &mut UiState, ev: ShellEvent) {
    match ev {
        ShellEvent::Info(info) => state.info = info.to_message(),
        ShellEvent::DestinationRequested {
            default_path,
            reply,
        } => {
            // A stale prompt is answered as cancelled.
            if let Some(old) = state.prompt.take() {
                old.answer(false);
            }
            state.prompt = Some(SavePrompt {
                input: default_path.display().to_string(),
                reply,
            });
        }
    }
}

/// Check outstanding bridge replies.
fn poll_pending(state: &mut UiState) {
    if let Some(pending) = state.pending_job.as_mut() {
        match pending.try_recv() {
            Ok(outcome) => {
                state.pending_job = None;
                state.presentation.on_job_outcome(&outcome);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Closed) => {
                state.pending_job = None;
                state
                    .presentation
                    .on_job_outcome(&crate::model::JobOutcome::Failed {
                        reason: "orchestrator stopped before the job finished".into(),
                    });
            }
        }
    }

    if let Some(pending) = state.pending_save.as_mut() {
        match pending.try_recv() {
            Ok(destination) => {
                state.pending_save = None;
                state.presentation.on_save_result(destination);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Closed) => {
                state.pending_save = None;
                state.presentation.on_save_result(None);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    Continue,
    Quit,
}

fn handle_key(state: &mut UiState, bridge: &Bridge, k: KeyEvent) -> KeyAction {
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    if k.code == KeyCode::F(1) {
        state.show_help = !state.show_help;
        return KeyAction::Continue;
    }
    if !state.is_editing() && k.code == KeyCode::Char('q') {
        return KeyAction::Quit;
    }

    if let Some(prompt) = state.prompt.as_mut() {
        match k.code {
            KeyCode::Enter => {
                if let Some(p) = state.prompt.take() {
                    p.answer(true);
                }
            }
            KeyCode::Esc => {
                if let Some(p) = state.prompt.take() {
                    p.answer(false);
                }
            }
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Char(c) => prompt.input.push(c),
            _ => {}
        }
        return KeyAction::Continue;
    }

    match state.presentation.view() {
        View::Initial => match k.code {
            KeyCode::Esc => return KeyAction::Quit,
            KeyCode::Enter => submit(state, bridge),
            KeyCode::Tab => state.format = state.format.next(),
            KeyCode::Backspace => {
                state.file_input.pop();
            }
            KeyCode::Char(c) => state.file_input.push(c),
            _ => {}
        },
        // The only way out of Running is the job outcome.
        View::Submitted | View::Running => {}
        View::Succeeded => match k.code {
            KeyCode::Char('s') => {
                if state.presentation.begin_save() {
                    state.pending_save = Some(bridge.save_file());
                }
            }
            KeyCode::Char('y') => copy_saved_path(state),
            KeyCode::Char('h') => return_home(state),
            _ => {}
        },
        View::Failed => {
            if k.code == KeyCode::Char('h') {
                return_home(state);
            }
        }
    }
    KeyAction::Continue
}

fn submit(state: &mut UiState, bridge: &Bridge) {
    let handle = state.file_handle();
    let Some(submission) = state.presentation.submit(&handle, state.format) else {
        return;
    };
    let path = bridge.path_for_file(&submission.file);
    state.pending_job = Some(bridge.run_program(&path, submission.format_hint));
    state.presentation.mark_running();
    state.info = format!("Submitted {path}");
}

fn return_home(state: &mut UiState) {
    if state.presentation.return_home() {
        state.reset_form();
        state.info.clear();
    }
}

fn copy_saved_path(state: &mut UiState) {
    let Some(crate::presentation::SaveBanner::Saved(path)) = state.presentation.save_banner()
    else {
        return;
    };
    let path = path.clone();
    match clipboard::copy_to_clipboard(&path.display().to_string()) {
        Ok(()) => state.info = format!("Copied: {}", path.display()),
        Err(e) => state.info = format!("Copy failed: {e:#}"),
    }
}
