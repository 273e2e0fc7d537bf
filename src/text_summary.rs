//! Run summary for CLI and TUI output.
//!
//! A `RunSummary` is fed every controller event of one run and formats the closing
//! lines shown after the run ends.

use crate::model::{Channel, ControllerEvent, RunStatus};
use serde::Serialize;
use std::time::Duration;

/// Exit code used for runs stopped on request (as after Ctrl-C in a shell).
pub(crate) const EXIT_TERMINATED: i32 = 130;
/// Exit code used when cppp could not be started (as for "command not found").
pub(crate) const EXIT_LAUNCH_FAILED: i32 = 127;

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct RunSummary {
    pub started_at: Option<String>,
    pub command: Option<String>,
    pub pid: Option<u32>,
    pub status: Option<RunStatus>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Option<Duration>,
    pub stdout_lines: u64,
    pub stderr_lines: u64,
    pub malformed_lines: u64,
}

impl RunSummary {
    /// Fold one controller event into the summary.
    pub fn observe(&mut self, ev: &ControllerEvent) {
        match ev {
            ControllerEvent::RunStarted { pid, command } => {
                *self = RunSummary {
                    started_at: Some(now_rfc3339()),
                    command: Some(command.clone()),
                    pid: *pid,
                    ..Default::default()
                };
            }
            ControllerEvent::Output(line) => {
                match line.channel {
                    Channel::Stdout => self.stdout_lines += 1,
                    Channel::Stderr => self.stderr_lines += 1,
                }
                if line.malformed {
                    self.malformed_lines += 1;
                }
            }
            ControllerEvent::RunFinished { status, elapsed } => {
                // No RunStarted precedes a launch failure; drop the previous run's figures.
                if matches!(status, RunStatus::LaunchFailed(_)) {
                    *self = RunSummary::default();
                }
                self.status = Some(status.clone());
                self.elapsed = Some(*elapsed);
            }
            ControllerEvent::StateChanged { .. }
            | ControllerEvent::Rejected { .. }
            | ControllerEvent::Info(_) => {}
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

/// Local wall-clock time for log banners.
pub(crate) fn clock_now() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Build the closing lines for a finished run.
pub(crate) fn build_text_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(status) = summary.status.as_ref() else {
        return lines;
    };

    let mark = match status {
        s if s.is_success() => "✓",
        RunStatus::Terminated { .. } => "■",
        _ => "✗",
    };
    lines.push(format!("{mark} {}", status.to_message()));

    if let Some(elapsed) = summary.elapsed.filter(|d| !d.is_zero()) {
        let rounded = Duration::from_millis(elapsed.as_millis() as u64);
        lines.push(format!("  Elapsed: {}", humantime::format_duration(rounded)));
    }
    if summary.command.is_some() {
        let mut output = format!(
            "  Output:  {} stdout / {} stderr line(s)",
            summary.stdout_lines, summary.stderr_lines
        );
        if summary.malformed_lines > 0 {
            output.push_str(&format!(", {} not valid UTF-8", summary.malformed_lines));
        }
        lines.push(output);
    }
    match status {
        RunStatus::Success => lines.push("  All files were copied.".into()),
        RunStatus::Failure { .. } => {
            lines.push("  Check the error messages above.".into());
        }
        _ => {}
    }
    lines
}

/// Process exit code mirroring a run's terminal status.
pub(crate) fn exit_code(status: &RunStatus) -> i32 {
    match status {
        RunStatus::Success => 0,
        RunStatus::Failure { code } => (*code).clamp(1, 255),
        RunStatus::Terminated { .. } => EXIT_TERMINATED,
        RunStatus::LaunchFailed(_) => EXIT_LAUNCH_FAILED,
        RunStatus::UnexpectedError(_) => 1,
    }
}
