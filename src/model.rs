use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A fully validated command line for one run of the copy tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RunRequest {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Render the command line for display. Arguments containing whitespace are quoted.
    pub fn display_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        for arg in &self.args {
            if arg.is_empty() || arg.chars().any(char::is_whitespace) {
                parts.push(format!("{arg:?}"));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stdout,
    Stderr,
}

/// One line of child output, tagged with the channel it was written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub channel: Channel,
    pub line: String,
    /// Set when the raw bytes were not valid UTF-8; `line` is then a lossy decode.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub malformed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Stopping => "Stopping",
        }
    }
}

/// Terminal status of a run. Exactly one is reported per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure { code: i32 },
    Terminated { forced: bool },
    LaunchFailed(String),
    UnexpectedError(String),
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }

    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            RunStatus::Success => "Copy completed successfully".to_string(),
            RunStatus::Failure { code } => format!("Copy failed (exit code {code})"),
            RunStatus::Terminated { forced: false } => "Copy stopped".to_string(),
            RunStatus::Terminated { forced: true } => {
                "Copy force-killed after ignoring the stop request".to_string()
            }
            RunStatus::LaunchFailed(reason) => format!("Could not start cppp: {reason}"),
            RunStatus::UnexpectedError(detail) => format!("Unexpected error: {detail}"),
        }
    }
}

/// Events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerEvent {
    StateChanged {
        state: RunState,
    },
    RunStarted {
        pid: Option<u32>,
        command: String,
    },
    Output(OutputEvent),
    RunFinished {
        status: RunStatus,
        #[serde(with = "humantime_serde")]
        elapsed: Duration,
    },
    Rejected {
        error: ControlError,
    },
    Info(InfoEvent),
}

/// Structured progress notes emitted while a run is being supervised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoEvent {
    Message(String),
    Stopping {
        #[serde(with = "humantime_serde")]
        grace: Duration,
    },
    ForceKilling,
    StillStopping,
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Stopping { grace } => format!(
                "Stopping cppp (force kill after {})…",
                humantime::format_duration(*grace)
            ),
            InfoEvent::ForceKilling => "cppp is not responding, force-killing…".to_string(),
            InfoEvent::StillStopping => "Still waiting for cppp to exit…".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_line_quotes_arguments_with_spaces() {
        let req = RunRequest::new(
            "./build/cppp",
            vec!["-i".into(), "my file.txt".into(), "-o".into(), "/dst".into()],
        );
        assert_eq!(req.display_line(), r#"./build/cppp -i "my file.txt" -o /dst"#);
    }

    #[test]
    fn output_event_omits_clean_marker_in_json() {
        let ev = OutputEvent {
            channel: Channel::Stderr,
            line: "warn".into(),
            malformed: false,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json, serde_json::json!({"channel": "stderr", "line": "warn"}));
    }

    #[test]
    fn run_finished_serializes_elapsed_as_human_duration() {
        let ev = ControllerEvent::RunFinished {
            status: RunStatus::Failure { code: 3 },
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["run_finished"]["elapsed"], "1s 500ms");
        assert_eq!(json["run_finished"]["status"]["failure"]["code"], 3);
    }

    #[test]
    fn terminated_messages_distinguish_forced_kill() {
        assert_ne!(
            RunStatus::Terminated { forced: false }.to_message(),
            RunStatus::Terminated { forced: true }.to_message()
        );
    }
}
