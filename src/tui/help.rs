use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn key(k: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(k, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Upload form:"),
        key("type", 8, "Path to a .json or .csv patient records file"),
        key("tab", 9, "Cycle record format"),
        key("enter", 7, "Submit"),
        key("esc", 9, "Quit"),
        Line::from(""),
        Line::from("Results:"),
        key("s", 11, "Save results file"),
        key("y", 11, "Copy saved path to clipboard"),
        key("h", 11, "Return home"),
        key("q", 11, "Quit"),
        Line::from(""),
        Line::from("Save prompt:"),
        key("enter", 7, "Save to the entered path"),
        key("esc", 9, "Cancel"),
        Line::from(""),
        Line::from("Anywhere:"),
        key("F1", 10, "Toggle this help"),
        key("Ctrl-C", 6, "Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "A running job cannot be cancelled; quitting stops the engine.",
            Style::default().fg(Color::Gray),
        )),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
