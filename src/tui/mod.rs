mod help;
mod state;

use crate::cli::{self, Cli};
use crate::command;
use crate::model::{Channel, ControllerEvent, RunState, RunStatus};
use crate::orchestrator::{self, UiCommand};
use crate::resolver;
use crate::text_summary;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use state::{push_wrapped_status_kv, Field, LogKind, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels keep the UI thread from ever blocking on the controller.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ControllerEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let res = orchestrator::run_controller(cli::build_config(&args), event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<ControllerEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        form: cli::form_from_args(&args),
        info: "Fill in the form and press Enter to start".into(),
        ..Default::default()
    };
    if args.start_on_launch {
        start_or_stop(&args, &mut state, &cmd_tx);
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        let mut finished = false;
        while let Ok(ev) = event_rx.try_recv() {
            finished |= matches!(ev, ControllerEvent::RunFinished { .. });
            apply_event(&mut state, ev);
        }
        if state.quitting && finished {
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            let Ok(Event::Key(k)) = event::read() else {
                continue;
            };
            if k.kind != KeyEventKind::Press {
                continue;
            }
            match (k.modifiers, k.code) {
                (_, KeyCode::Esc) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    if !state.is_busy() || state.quitting {
                        break Ok(());
                    }
                    // The controller stops the run; leave once its report arrives.
                    state.quitting = true;
                    state.info = "Stopping cppp before exit… (press Esc again to leave now)".into();
                }
                (KeyModifiers::CONTROL, KeyCode::Char('l')) => {
                    state.log.clear();
                }
                (_, KeyCode::F(1)) => {
                    state.tab = if state.tab == 0 { 1 } else { 0 };
                }
                (_, KeyCode::Enter) => {
                    start_or_stop(&args, &mut state, &cmd_tx);
                }
                (_, KeyCode::Tab) | (_, KeyCode::Down) => {
                    state.focus = state.focus.next();
                }
                (_, KeyCode::BackTab) | (_, KeyCode::Up) => {
                    state.focus = state.focus.prev();
                }
                (_, KeyCode::Backspace) => {
                    state.backspace();
                }
                (_, KeyCode::Char(' ')) if !state.focus.is_text() => {
                    if !state.toggle_focused() {
                        state.info = "The form is locked while cppp is running".into();
                    }
                }
                (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
                    if state.is_busy() {
                        state.info = "The form is locked while cppp is running".into();
                    } else {
                        state.insert_char(c);
                    }
                }
                _ => {}
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Enter: start a copy from the form when idle, request a stop while running.
fn start_or_stop(args: &Cli, state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    match state.run_state {
        RunState::Idle => {
            let validated = match state.form.validate() {
                Ok(v) => v,
                Err(e) => {
                    state.info = format!("✗ {e}");
                    return;
                }
            };
            let request =
                match command::build_request(&cli::candidates(args), &validated.options) {
                    Ok(req) => req,
                    Err(e) => {
                        state.info = format!("✗ {e}");
                        state.push_log(LogKind::Error, e.to_string());
                        for hint in resolver::INSTALL_HINTS {
                            state.push_log(LogKind::Note, *hint);
                        }
                        return;
                    }
                };
            state.log.clear();
            for warning in validated.warnings {
                state.push_log(LogKind::Note, format!("⚠ {warning}"));
            }
            state.info = "Starting cppp…".into();
            let _ = cmd_tx.send(UiCommand::Start(request));
        }
        RunState::Running => {
            state.info = "Stop requested…".into();
            let _ = cmd_tx.send(UiCommand::Stop);
        }
        RunState::Stopping => {
            state.info = "Already stopping, waiting for cppp to exit…".into();
        }
    }
}

fn apply_event(state: &mut UiState, ev: ControllerEvent) {
    state.summary.observe(&ev);
    match ev {
        ControllerEvent::StateChanged { state: run_state } => {
            state.run_state = run_state;
        }
        ControllerEvent::RunStarted { pid, command } => {
            state.run_start = Some(Instant::now());
            state.push_log(
                LogKind::Note,
                format!("── {} command: {command}", text_summary::clock_now()),
            );
            state.command = Some(command);
            state.info = match pid {
                Some(pid) => format!("cppp running (pid {pid})"),
                None => "cppp running".into(),
            };
        }
        ControllerEvent::Output(line) => {
            let (kind, text) = match (line.malformed, line.channel) {
                (true, _) => (LogKind::Malformed, format!("? {}", line.line)),
                (false, Channel::Stdout) => (LogKind::Stdout, line.line),
                (false, Channel::Stderr) => (LogKind::Stderr, format!("! {}", line.line)),
            };
            state.push_log(kind, text);
        }
        ControllerEvent::Info(info) => {
            let msg = info.to_message();
            state.push_log(LogKind::Note, msg.clone());
            state.info = msg;
        }
        ControllerEvent::Rejected { error } => {
            state.info = format!("✗ {error}");
        }
        ControllerEvent::RunFinished { status, .. } => {
            state.run_start = None;
            let kind = match status {
                RunStatus::Success => LogKind::Success,
                RunStatus::Terminated { .. } => LogKind::Note,
                _ => LogKind::Error,
            };
            state.push_log(
                kind,
                format!("── {} finished", text_summary::clock_now()),
            );
            for line in text_summary::build_text_summary(&state.summary) {
                state.push_log(kind, line);
            }
            if matches!(status, RunStatus::LaunchFailed(_)) {
                state.command = None;
                for hint in resolver::INSTALL_HINTS {
                    state.push_log(LogKind::Note, *hint);
                }
            }
            state.info = status.to_message();
        }
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Run"), Line::from("Help (F1)")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("cppp-tui"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_run(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_run(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(0)].as_ref())
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(12), Constraint::Min(0)].as_ref())
        .split(cols[0]);

    draw_form(left[0], f, state);
    draw_status(left[1], f, state);
    draw_log(cols[1], f, state);
}

fn draw_form(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let form = &state.form;
    let editable = !state.is_busy();
    let mut lines = Vec::with_capacity(Field::ALL.len() + 2);

    for field in Field::ALL {
        let focused = field == state.focus;
        let marker = if focused { "> " } else { "  " };
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let value = match field {
            Field::Input => form.input.clone(),
            Field::Output => form.output.clone(),
            Field::Parts => form.parts.clone(),
            Field::Mode => {
                let (copy, mv) = match form.mode {
                    command::CopyMode::Copy => ("(•)", "( )"),
                    command::CopyMode::Move => ("( )", "(•)"),
                };
                format!("{copy} copy  {mv} move")
            }
            Field::Verbose => checkbox(form.verbose),
            Field::Force => checkbox(form.force),
            Field::Checksum => checkbox(form.checksum),
        };
        let mut spans = vec![
            Span::styled(marker, label_style),
            Span::styled(format!("{:<12}", field.label()), label_style),
            Span::raw(value),
        ];
        if focused && editable && field.is_text() {
            spans.push(Span::styled("▏", Style::default().fg(Color::Yellow)));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(""));
    let action = match state.run_state {
        RunState::Idle => "Enter: start",
        RunState::Running => "Enter: stop",
        RunState::Stopping => "stopping…",
    };
    lines.push(Line::from(Span::styled(
        format!("{action}  Tab: next field  Space: toggle"),
        Style::default().fg(Color::DarkGray),
    )));

    let title = format!("{} files", form.mode.as_str());
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn checkbox(on: bool) -> String {
    let mark = if on { "[x]" } else { "[ ]" };
    mark.to_string()
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let state_color = match state.run_state {
        RunState::Idle => Color::Green,
        RunState::Running => Color::Cyan,
        RunState::Stopping => Color::Yellow,
    };
    let mut lines = vec![Line::from(vec![
        Span::styled("State:", Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(state.run_state.label(), Style::default().fg(state_color)),
    ])];
    if let Some(pid) = state.summary.pid.filter(|_| state.is_busy()) {
        push_wrapped_status_kv(&mut lines, "PID", &pid.to_string(), area.width);
    }
    if let Some(start) = state.run_start {
        let elapsed = Duration::from_secs(start.elapsed().as_secs());
        push_wrapped_status_kv(
            &mut lines,
            "Elapsed",
            &humantime::format_duration(elapsed).to_string(),
            area.width,
        );
    }
    if let Some(cmd) = state.command.as_deref() {
        push_wrapped_status_kv(&mut lines, "Command", cmd, area.width);
    }
    push_wrapped_status_kv(&mut lines, "Info", &state.info, area.width);

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}

fn draw_log(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    // Newest lines stay visible; older ones scroll off the top.
    let visible = area.height.saturating_sub(2) as usize;
    let skip = state.log.len().saturating_sub(visible);
    let lines: Vec<Line> = state
        .log
        .iter()
        .skip(skip)
        .map(|l| {
            let style = match l.kind {
                LogKind::Stdout => Style::default(),
                LogKind::Stderr => Style::default().fg(Color::Yellow),
                LogKind::Malformed => Style::default().fg(Color::Red),
                LogKind::Note => Style::default().fg(Color::Cyan),
                LogKind::Success => Style::default().fg(Color::Green),
                LogKind::Error => Style::default().fg(Color::Red),
            };
            Line::from(Span::styled(l.text.clone(), style))
        })
        .collect();

    let title = format!("Output ({} lines, Ctrl-L to clear)", state.log.len());
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}
