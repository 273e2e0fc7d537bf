use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("Esc", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (stops a running copy first)"),
        ]),
        key_line("Enter", 9, "Start / stop the copy"),
        key_line("Tab", 11, "Next field"),
        key_line("Shift-Tab", 5, "Previous field"),
        key_line("Space", 9, "Toggle mode or option"),
        key_line("Ctrl-L", 8, "Clear the log"),
        key_line("F1", 12, "Show / hide this help"),
        Line::from(""),
        Line::from("What is cppp?"),
        Line::from("  cppp (cp++) copies files and directories like cp, splitting the work"),
        Line::from("  across several threads. Move mode deletes the source after copying."),
        Line::from(""),
        Line::from("Options:"),
        Line::from("  Threads   number of parallel parts (4-20 recommended; empty = default)"),
        Line::from("  Verbose   print every copied file"),
        Line::from("  Force     overwrite existing files"),
        Line::from("  Checksum  verify each copy"),
        Line::from(""),
        Line::from("Stopping:"),
        Line::from("  Stop asks cppp to exit; if it has not exited after the grace period"),
        Line::from("  (--grace-period, default 5s) it is killed."),
        Line::from(""),
        Line::from("Command-line equivalents:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("cppp -i file.txt -o /dest/ -p 4 -v", Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                "cppp -i /src/dir -o /backup/ -p 20 -v -c",
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("cppp -m move -i /src -o /dest/ -p 8 -f", Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
        Line::from("Repository:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                "https://github.com/kernelginar/cppp",
                Style::default().fg(Color::Cyan),
            ),
        ]),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
