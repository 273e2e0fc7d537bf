//! Per-run supervision task.
//!
//! Owns the child process for the lifetime of one run: forwards its output, waits for
//! it to exit, and runs the stop sequence when the controller asks for it. The task's
//! return value is the run's single terminal status.

use super::multiplex::multiplex;
use super::terminate::terminate;
use crate::error::LaunchError;
use crate::model::{ControllerEvent, InfoEvent, OutputEvent, RunRequest, RunStatus};
use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long output is still collected after a stopped child has been reaped.
///
/// Only matters when something else (a grandchild) keeps the pipes open.
const POST_STOP_DRAIN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub(crate) enum RunControl {
    Stop,
}

/// A launched child, as seen by the controller.
pub(crate) struct SpawnedRun {
    pub pid: Option<u32>,
    pub ctrl_tx: UnboundedSender<RunControl>,
    pub task: JoinHandle<Result<RunStatus>>,
}

/// Spawn the child and its supervision task.
///
/// Spawning happens before this returns, so launch failures surface here and no task
/// is created for them.
pub(crate) fn launch(
    request: &RunRequest,
    event_tx: UnboundedSender<ControllerEvent>,
    grace: Duration,
) -> Result<SpawnedRun, LaunchError> {
    let mut child = Command::new(&request.program)
        .args(&request.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| LaunchError::spawn(&request.program, err))?;

    // Dropping `child` on these paths kills it.
    let stdout = child
        .stdout
        .take()
        .ok_or(LaunchError::MissingPipe("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(LaunchError::MissingPipe("stderr"))?;

    let pid = child.id();
    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel::<RunControl>();
    let lines = multiplex(stdout, stderr);
    let task = tokio::spawn(supervise(child, lines, event_tx, ctrl_rx, grace));

    Ok(SpawnedRun { pid, ctrl_tx, task })
}

async fn supervise<S>(
    mut child: Child,
    mut lines: S,
    event_tx: UnboundedSender<ControllerEvent>,
    mut ctrl_rx: UnboundedReceiver<RunControl>,
    grace: Duration,
) -> Result<RunStatus>
where
    S: Stream<Item = io::Result<OutputEvent>> + Unpin,
{
    let mut streams_open = true;
    let mut exit: Option<ExitStatus> = None;
    let mut stop_requested = false;

    // Stdout, stderr and the exit wait all progress together; the run completes once
    // both streams have ended and the exit status is known.
    while streams_open || exit.is_none() {
        tokio::select! {
            item = lines.next(), if streams_open => {
                streams_open = forward(item, &event_tx)?;
            }
            status = child.wait(), if exit.is_none() => {
                let status = status.context("waiting for cppp to exit")?;
                debug!(%status, "child exited");
                exit = Some(status);
            }
            // A closed control channel means the controller is gone; stop as well.
            ctrl = ctrl_rx.recv() => {
                debug!(?ctrl, "stop requested");
                stop_requested = true;
                break;
            }
        }
    }

    if let Some(status) = exit {
        // Stopped after cppp already exited: only its inherited pipes are left.
        if stop_requested && streams_open {
            drain_remaining(&mut lines, &event_tx).await?;
        }
        return Ok(completion_status(status));
    }

    let _ = event_tx.send(ControllerEvent::Info(InfoEvent::Stopping { grace }));
    let escalate_tx = event_tx.clone();
    let termination = terminate(&mut child, grace, move || {
        let _ = escalate_tx.send(ControllerEvent::Info(InfoEvent::ForceKilling));
    });
    tokio::pin!(termination);

    // Output keeps flowing while the child shuts down.
    let outcome = loop {
        tokio::select! {
            item = lines.next(), if streams_open => {
                streams_open = forward(item, &event_tx)?;
            }
            res = &mut termination => {
                break res.context("stopping cppp")?;
            }
        }
    };
    info!(forced = outcome.forced, status = %outcome.status, "child stopped");

    if streams_open {
        drain_remaining(&mut lines, &event_tx).await?;
    }

    Ok(RunStatus::Terminated {
        forced: outcome.forced,
    })
}

/// Send one multiplexer item to the sink. Returns whether the streams are still open.
fn forward(
    item: Option<io::Result<OutputEvent>>,
    event_tx: &UnboundedSender<ControllerEvent>,
) -> Result<bool> {
    match item {
        Some(line) => {
            let line = line.context("reading cppp output")?;
            let _ = event_tx.send(ControllerEvent::Output(line));
            Ok(true)
        }
        None => {
            debug!("child output streams closed");
            Ok(false)
        }
    }
}

async fn drain_remaining<S>(lines: &mut S, event_tx: &UnboundedSender<ControllerEvent>) -> Result<()>
where
    S: Stream<Item = io::Result<OutputEvent>> + Unpin,
{
    let drain = async {
        while forward(lines.next().await, event_tx)? {}
        Ok::<(), anyhow::Error>(())
    };
    match tokio::time::timeout(POST_STOP_DRAIN, drain).await {
        Ok(res) => res,
        Err(_) => {
            warn!("output pipes still open after cppp exited; abandoning them");
            Ok(())
        }
    }
}

fn completion_status(status: ExitStatus) -> RunStatus {
    if status.success() {
        return RunStatus::Success;
    }
    RunStatus::Failure {
        code: status.code().unwrap_or_else(|| signal_exit_code(status)),
    }
}

// Shell convention for a child that died from a signal nobody here sent.
#[cfg(unix)]
fn signal_exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map_or(-1, |sig| 128 + sig)
}

#[cfg(not(unix))]
fn signal_exit_code(_status: ExitStatus) -> i32 {
    -1
}
