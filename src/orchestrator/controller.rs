//! Run lifecycle controller.
//!
//! Owns the Idle → Running → Stopping → Idle state machine and emits events for
//! presentation layers. At most one run exists at a time.

use super::supervisor::{self, RunControl};
use crate::error::ControlError;
use crate::model::{ControllerEvent, InfoEvent, RunRequest, RunState, RunStatus};
use anyhow::Result;
use std::time::Instant;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinError;
use tokio::time::Duration;
use tracing::{info, warn};

/// Commands emitted by UI layers to control the run.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Start(RunRequest),
    Stop,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ControllerConfig {
    /// How long a stopped child may take to exit before it is killed.
    pub grace_period: Duration,
}

/// The one in-flight run. Dropping it releases the child.
struct RunHandle {
    pid: Option<u32>,
    started: Instant,
    ctrl_tx: UnboundedSender<RunControl>,
    task: Option<tokio::task::JoinHandle<Result<RunStatus>>>,
}

fn set_state(state: &mut RunState, next: RunState, event_tx: &UnboundedSender<ControllerEvent>) {
    if *state != next {
        *state = next;
        let _ = event_tx.send(ControllerEvent::StateChanged { state: next });
    }
}

/// Orchestrate runs based on UI commands and emit events back to presentation layers.
pub(crate) async fn run_controller(
    cfg: ControllerConfig,
    event_tx: UnboundedSender<ControllerEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut active: Option<RunHandle> = None;
    let mut state = RunState::Idle;
    let mut quit_pending = false;
    let mut commands_closed = false;
    // Stop watchdog: if the kill itself is slow, emit a status message to keep UI feedback alive.
    let mut stop_deadline: Option<tokio::time::Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));

    let res = loop {
        tokio::select! {
            cmd = cmd_rx.recv(), if !commands_closed => {
                let closed = cmd.is_none();
                match cmd {
                    Some(UiCommand::Start(request)) => {
                        if state != RunState::Idle {
                            let _ = event_tx.send(ControllerEvent::Rejected {
                                error: ControlError::AlreadyRunning,
                            });
                            continue;
                        }
                        match supervisor::launch(&request, event_tx.clone(), cfg.grace_period) {
                            Ok(run) => {
                                info!(pid = ?run.pid, program = %request.program.display(), "started cppp");
                                let _ = event_tx.send(ControllerEvent::RunStarted {
                                    pid: run.pid,
                                    command: request.display_line(),
                                });
                                active = Some(RunHandle {
                                    pid: run.pid,
                                    started: Instant::now(),
                                    ctrl_tx: run.ctrl_tx,
                                    task: Some(run.task),
                                });
                                set_state(&mut state, RunState::Running, &event_tx);
                            }
                            Err(e) => {
                                warn!(error = %e, "failed to start cppp");
                                let _ = event_tx.send(ControllerEvent::RunFinished {
                                    status: RunStatus::LaunchFailed(e.to_string()),
                                    elapsed: Duration::ZERO,
                                });
                            }
                        }
                    }
                    Some(UiCommand::Stop) => {
                        if request_stop(active.as_ref(), &mut state, &event_tx) {
                            stop_deadline = Some(tokio::time::Instant::now() + cfg.grace_period + Duration::from_secs(1));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // Quit waits for the current run to finish so the terminal status is still reported.
                        quit_pending = true;
                        commands_closed |= closed;
                        if active.is_none() {
                            break Ok(());
                        }
                        if request_stop(active.as_ref(), &mut state, &event_tx) {
                            stop_deadline = Some(tokio::time::Instant::now() + cfg.grace_period + Duration::from_secs(1));
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(run) = &mut active {
                    if let Some(h) = run.task.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    finish_run(join_res, &mut active, &mut state, &event_tx);
                    stop_deadline = None;
                    if quit_pending {
                        break Ok(());
                    }
                }
            }
            // If the stop stalls (e.g. the OS is slow to reap), keep the user informed.
            _ = watchdog.tick() => {
                if let Some(deadline) = stop_deadline {
                    if tokio::time::Instant::now() >= deadline && state == RunState::Stopping {
                        let _ = event_tx.send(ControllerEvent::Info(InfoEvent::StillStopping));
                        stop_deadline = None;
                    }
                }
            }
        }
    };

    res
}

/// Report the single terminal status of the active run and return to Idle.
fn finish_run(
    join_res: Result<Result<RunStatus>, JoinError>,
    active: &mut Option<RunHandle>,
    state: &mut RunState,
    event_tx: &UnboundedSender<ControllerEvent>,
) {
    let status = match join_res {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => RunStatus::UnexpectedError(format!("{e:#}")),
        Err(e) => RunStatus::UnexpectedError(format!("supervisor task failed: {e}")),
    };
    let elapsed = active
        .take()
        .map(|run| {
            info!(pid = ?run.pid, ?status, "cppp run finished");
            run.started.elapsed()
        })
        .unwrap_or_default();
    let _ = event_tx.send(ControllerEvent::RunFinished { status, elapsed });
    set_state(state, RunState::Idle, event_tx);
}

/// Move a running run to Stopping. Returns false (and does nothing) in any other state.
fn request_stop(
    active: Option<&RunHandle>,
    state: &mut RunState,
    event_tx: &UnboundedSender<ControllerEvent>,
) -> bool {
    let Some(run) = active else {
        return false;
    };
    if *state != RunState::Running {
        return false;
    }
    info!(pid = ?run.pid, "stopping cppp");
    let _ = run.ctrl_tx.send(RunControl::Stop);
    set_state(state, RunState::Stopping, event_tx);
    true
}
