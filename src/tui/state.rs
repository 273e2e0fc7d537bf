use crate::command::CopyForm;
use crate::model::RunState;
use crate::text_summary::RunSummary;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::collections::VecDeque;
use std::time::Instant;

/// Focusable entries of the copy form, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Input,
    Output,
    Parts,
    Mode,
    Verbose,
    Force,
    Checksum,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Input,
        Field::Output,
        Field::Parts,
        Field::Mode,
        Field::Verbose,
        Field::Force,
        Field::Checksum,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Input => "Source",
            Field::Output => "Destination",
            Field::Parts => "Threads",
            Field::Mode => "Mode",
            Field::Verbose => "Verbose",
            Field::Force => "Force",
            Field::Checksum => "Checksum",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(self, Field::Input | Field::Output | Field::Parts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Stdout,
    Stderr,
    Malformed,
    Note,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LogKind,
    pub text: String,
}

pub struct UiState {
    pub tab: usize,
    pub form: CopyForm,
    pub focus: Field,
    pub run_state: RunState,
    pub info: String,
    pub log: VecDeque<LogLine>,
    pub command: Option<String>,
    pub summary: RunSummary,
    pub run_start: Option<Instant>,
    pub quitting: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            form: CopyForm::default(),
            focus: Field::Input,
            run_state: RunState::Idle,
            info: String::new(),
            log: VecDeque::new(),
            command: None,
            summary: RunSummary::default(),
            run_start: None,
            quitting: false,
        }
    }
}

impl UiState {
    pub fn push_log(&mut self, kind: LogKind, text: impl Into<String>) {
        const MAX: usize = 5000;
        self.log.push_back(LogLine {
            kind,
            text: text.into(),
        });
        while self.log.len() > MAX {
            self.log.pop_front();
        }
    }

    /// The form is locked while a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.run_state != RunState::Idle
    }

    fn focused_text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            Field::Input => Some(&mut self.form.input),
            Field::Output => Some(&mut self.form.output),
            Field::Parts => Some(&mut self.form.parts),
            _ => None,
        }
    }

    /// Type into the focused text field. Returns false if the field is not editable.
    pub fn insert_char(&mut self, c: char) -> bool {
        if self.is_busy() {
            return false;
        }
        match self.focused_text_mut() {
            Some(text) => {
                text.push(c);
                true
            }
            None => false,
        }
    }

    pub fn backspace(&mut self) {
        if self.is_busy() {
            return;
        }
        if let Some(text) = self.focused_text_mut() {
            text.pop();
        }
    }

    /// Flip the focused mode/checkbox field. Returns false for text fields.
    pub fn toggle_focused(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        let form = &mut self.form;
        match self.focus {
            Field::Mode => form.mode = form.mode.toggled(),
            Field::Verbose => form.verbose = !form.verbose,
            Field::Force => form.force = !form.force,
            Field::Checksum => form.checksum = !form.checksum,
            Field::Input | Field::Output | Field::Parts => return false,
        }
        true
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CopyMode;

    #[test]
    fn focus_cycles_through_every_field() {
        let mut f = Field::Input;
        for _ in 0..Field::ALL.len() {
            f = f.next();
        }
        assert_eq!(f, Field::Input);
        assert_eq!(Field::Input.prev(), Field::Checksum);
    }

    #[test]
    fn typing_edits_only_text_fields() {
        let mut s = UiState::default();
        assert!(s.insert_char('a'));
        s.focus = Field::Parts;
        assert!(s.insert_char('8'));
        s.focus = Field::Verbose;
        assert!(!s.insert_char('x'));
        assert_eq!(s.form.input, "a");
        assert_eq!(s.form.parts, "8");

        s.focus = Field::Input;
        s.backspace();
        assert!(s.form.input.is_empty());
    }

    #[test]
    fn toggles_flip_mode_and_flags() {
        let mut s = UiState::default();
        s.focus = Field::Mode;
        assert!(s.toggle_focused());
        assert_eq!(s.form.mode, CopyMode::Move);
        s.focus = Field::Checksum;
        assert!(s.toggle_focused());
        assert!(s.form.checksum);
        s.focus = Field::Output;
        assert!(!s.toggle_focused());
    }

    #[test]
    fn form_is_locked_while_running() {
        let mut s = UiState {
            run_state: RunState::Running,
            ..Default::default()
        };
        assert!(!s.insert_char('a'));
        s.focus = Field::Force;
        assert!(!s.toggle_focused());
        assert!(s.form.input.is_empty());
        assert!(!s.form.force);
    }

    #[test]
    fn log_keeps_only_the_newest_lines() {
        let mut s = UiState::default();
        for i in 0..5010 {
            s.push_log(LogKind::Stdout, i.to_string());
        }
        assert_eq!(s.log.len(), 5000);
        assert_eq!(s.log.front().map(|l| l.text.as_str()), Some("10"));
    }

    #[test]
    fn wrapped_status_splits_long_values() {
        let mut out = Vec::new();
        push_wrapped_status_kv(&mut out, "Command", &"x".repeat(40), 24);
        assert!(out.len() > 1);
    }
}
