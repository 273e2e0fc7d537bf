use crate::command::{self, CopyForm, CopyMode};
use crate::model::{Channel, ControllerEvent, RunRequest};
use crate::orchestrator::{self, ControllerConfig, UiCommand};
use crate::resolver;
use crate::text_summary::{self, RunSummary};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Exit code for arguments that fail validation in headless modes.
pub(crate) const EXIT_USAGE: i32 = 2;

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

#[derive(Debug, Parser, Clone)]
#[command(
    name = "cppp-tui",
    version,
    about = "Terminal front-end for the cppp parallel copy tool"
)]
pub struct Cli {
    /// Source file or directory
    #[arg(short = 'i', long)]
    pub input: Option<String>,

    /// Destination path
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Copy or move
    #[arg(short = 'm', long, value_enum, default_value_t = CopyMode::Copy)]
    pub mode: CopyMode,

    /// Number of parallel copy threads
    #[arg(short = 'p', long)]
    pub parts: Option<String>,

    /// Ask cppp for verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Overwrite existing files
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Verify copies with checksums
    #[arg(short = 'c', long)]
    pub checksum: bool,

    /// cppp executable to use; repeat to give several candidates, tried in order
    #[arg(long = "bin", value_name = "PATH")]
    pub binaries: Vec<String>,

    /// How long a stopped copy may take to exit before it is killed
    #[arg(long, default_value = "5s")]
    pub grace_period: humantime::Duration,

    /// Start the copy as soon as the TUI opens (requires --input and --output)
    #[arg(long)]
    pub start_on_launch: bool,

    /// Run without the TUI, streaming cppp output to stdout/stderr
    #[arg(long, conflicts_with = "json")]
    pub text: bool,

    /// Run without the TUI, printing every event as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Log filter for headless modes (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        self.text || self.json
    }
}

/// Run the selected mode and return the process exit code.
pub async fn run(args: Cli) -> Result<i32> {
    if args.is_headless() {
        init_tracing(&args.log_level);
        return run_headless(args).await;
    }

    #[cfg(feature = "tui")]
    {
        crate::tui::run(args).await?;
        Ok(0)
    }
    #[cfg(not(feature = "tui"))]
    {
        // Fallback when built without TUI support.
        init_tracing(&args.log_level);
        run_headless(args).await
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Build the controller configuration from CLI arguments.
pub fn build_config(args: &Cli) -> ControllerConfig {
    ControllerConfig {
        grace_period: Duration::from(args.grace_period),
    }
}

/// Executable candidates: `--bin` values if given, otherwise the defaults.
pub fn candidates(args: &Cli) -> Vec<String> {
    if args.binaries.is_empty() {
        resolver::DEFAULT_CANDIDATES
            .iter()
            .map(|c| c.to_string())
            .collect()
    } else {
        args.binaries.clone()
    }
}

/// Prefill the copy form from CLI arguments.
pub fn form_from_args(args: &Cli) -> CopyForm {
    CopyForm {
        mode: args.mode,
        input: args.input.clone().unwrap_or_default(),
        output: args.output.clone().unwrap_or_default(),
        parts: args.parts.clone().unwrap_or_default(),
        verbose: args.verbose,
        force: args.force,
        checksum: args.checksum,
    }
}

/// Validate the CLI arguments and resolve cppp, returning the request and any warnings.
pub fn prepare_request(args: &Cli) -> Result<(RunRequest, Vec<String>)> {
    let validated = form_from_args(args)
        .validate()
        .context("invalid copy options")?;
    let request = command::build_request(&candidates(args), &validated.options)?;
    Ok((request, validated.warnings))
}

/// Run one copy without the TUI and return its exit code.
async fn run_headless(args: Cli) -> Result<i32> {
    let (out_tx, out_handle) = spawn_output_writer();

    let (request, warnings) = match prepare_request(&args) {
        Ok(prepared) => prepared,
        Err(e) => {
            let _ = out_tx.send(OutputLine::Stderr(format!("error: {e:#}")));
            if e.downcast_ref::<crate::error::ResolveError>().is_some() {
                for hint in resolver::INSTALL_HINTS {
                    let _ = out_tx.send(OutputLine::Stderr(hint.to_string()));
                }
            }
            drop(out_tx);
            let _ = out_handle.await;
            return Ok(EXIT_USAGE);
        }
    };
    for warning in warnings {
        let _ = out_tx.send(OutputLine::Stderr(format!("warning: {warning}")));
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ControllerEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let controller = tokio::spawn(orchestrator::run_controller(
        build_config(&args),
        event_tx,
        cmd_rx,
    ));
    let _ = cmd_tx.send(UiCommand::Start(request));

    let mut summary = RunSummary::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            ev = event_rx.recv() => {
                let Some(ev) = ev else { break };
                summary.observe(&ev);
                if args.json {
                    let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string(&ev)?));
                } else {
                    render_text_event(&ev, &out_tx);
                }
                if summary.is_finished() {
                    let _ = cmd_tx.send(UiCommand::Quit);
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                let _ = out_tx.send(OutputLine::Stderr("Interrupted, stopping cppp…".into()));
                let _ = cmd_tx.send(UiCommand::Stop);
            }
        }
    }

    controller.await.context("controller task failed")??;

    if args.json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string(&summary)?));
    } else {
        for line in text_summary::build_text_summary(&summary) {
            let _ = out_tx.send(OutputLine::Stderr(line));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;

    Ok(summary
        .status
        .as_ref()
        .map(text_summary::exit_code)
        .unwrap_or(1))
}

fn render_text_event(ev: &ControllerEvent, out_tx: &mpsc::UnboundedSender<OutputLine>) {
    match ev {
        ControllerEvent::Output(line) => {
            let text = if line.malformed {
                format!("{} [invalid UTF-8]", line.line)
            } else {
                line.line.clone()
            };
            let _ = match line.channel {
                Channel::Stdout => out_tx.send(OutputLine::Stdout(text)),
                Channel::Stderr => out_tx.send(OutputLine::Stderr(text)),
            };
        }
        ControllerEvent::RunStarted { command, .. } => {
            let _ = out_tx.send(OutputLine::Stderr(format!("$ {command}")));
        }
        ControllerEvent::Info(info) => {
            let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
        }
        ControllerEvent::Rejected { error } => {
            let _ = out_tx.send(OutputLine::Stderr(format!("error: {error}")));
        }
        // The closing summary covers the terminal status.
        ControllerEvent::RunFinished { .. } | ControllerEvent::StateChanged { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cppp-tui").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_use_builtin_candidates_and_five_second_grace() {
        let args = parse(&[]);
        assert_eq!(candidates(&args), ["./build/cppp", "./cppp", "cppp"]);
        assert_eq!(build_config(&args).grace_period, Duration::from_secs(5));
        assert!(!args.is_headless());
    }

    #[test]
    fn short_flags_match_cppp_flags() {
        let args = parse(&["-i", "src", "-o", "dst", "-m", "move", "-p", "8", "-v", "-f", "-c"]);
        let form = form_from_args(&args);
        assert_eq!(form.mode, CopyMode::Move);
        assert_eq!(form.parts, "8");
        assert!(form.verbose && form.force && form.checksum);
    }

    #[test]
    fn bin_overrides_candidates_in_order() {
        let args = parse(&["--bin", "/opt/cppp", "--bin", "cppp2", "--grace-period", "1500ms"]);
        assert_eq!(candidates(&args), ["/opt/cppp", "cppp2"]);
        assert_eq!(build_config(&args).grace_period, Duration::from_millis(1500));
    }

    #[test]
    fn text_and_json_are_exclusive() {
        assert!(
            Cli::try_parse_from(["cppp-tui", "--text", "--json"]).is_err(),
            "--text and --json must conflict"
        );
    }

    #[test]
    fn prepare_request_rejects_missing_output() {
        let args = parse(&["--text", "-i", "src", "--bin", "cppp"]);
        let err = prepare_request(&args).unwrap_err();
        assert!(format!("{err:#}").contains("destination path must not be empty"));
    }

    #[test]
    fn prepare_request_builds_argv() {
        let args = parse(&["--text", "-i", "src", "-o", "dst", "-p", "99", "--bin", "cppp"]);
        let (req, warnings) = prepare_request(&args).unwrap();
        assert_eq!(req.program, std::path::PathBuf::from("cppp"));
        assert_eq!(req.args, ["-i", "src", "-o", "dst", "-p", "99"]);
        assert_eq!(warnings.len(), 1);
    }
}
