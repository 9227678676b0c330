use super::state::UiState;
use crate::model::FormatToken;
use crate::presentation::{FormatChoice, SaveBanner, View};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Lines of engine output shown on the error view.
const FAILURE_TAIL_LINES: usize = 12;

pub fn draw(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let title = Paragraph::new(Line::from(vec![Span::styled(
        "DedupliFHIR",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    if state.show_help {
        super::help::draw_help(chunks[1], f);
    } else {
        match state.presentation.view() {
            View::Initial | View::Submitted => draw_upload(chunks[1], f, state),
            View::Running => draw_running(chunks[1], f, state),
            View::Succeeded => draw_results(chunks[1], f, state),
            View::Failed => draw_failed(chunks[1], f, state),
        }
    }

    let status = Paragraph::new(state.info.as_str())
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}

fn alert(text: String, color: Color) -> Line<'static> {
    Line::from(Span::styled(
        text,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn draw_upload(area: Rect, f: &mut Frame, state: &UiState) {
    let mut lines = vec![
        Line::from(""),
        Line::from("Select a FHIR (.json) or CSV (.csv) patient records file."),
        Line::from(""),
        Line::from(vec![
            Span::styled("File:   ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}▏", state.file_input),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    let mut formats = vec![Span::styled("Format: ", Style::default().fg(Color::Gray))];
    let mut choice = FormatChoice::default();
    for _ in 0..4 {
        let style = if choice == state.format {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        formats.push(Span::styled(format!(" {} ", choice.label()), style));
        formats.push(Span::raw(" "));
        choice = choice.next();
    }
    lines.push(Line::from(formats));

    let name = state.file_handle().name().to_string();
    if !name.is_empty() {
        let token = state.format.resolve(&name);
        let mut runs_as = vec![
            Span::styled("Runs as: ", Style::default().fg(Color::Gray)),
            Span::raw(token.as_arg()),
        ];
        if token == FormatToken::Test && state.format == FormatChoice::Auto {
            runs_as.push(Span::styled(
                "  (press tab to pick FHIR for .json bundles)",
                Style::default().fg(Color::Yellow),
            ));
        }
        lines.push(Line::from(runs_as));
    }
    lines.push(Line::from(""));

    if let Some(banner) = state.presentation.form_banner() {
        lines.push(alert(banner.message(), Color::Red));
        lines.push(Line::from(""));
    }
    lines.push(Line::from(vec![
        Span::styled("enter", Style::default().fg(Color::Magenta)),
        Span::raw(" submit   "),
        Span::styled("tab", Style::default().fg(Color::Magenta)),
        Span::raw(" format   "),
        Span::styled("F1", Style::default().fg(Color::Magenta)),
        Span::raw(" help"),
    ]));

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Upload Patient Records File"),
        );
    f.render_widget(p, area);
}

fn draw_running(area: Rect, f: &mut Frame, state: &UiState) {
    let frame = SPINNER[state.spinner % SPINNER.len()];
    let p = Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(frame, Style::default().fg(Color::Cyan)),
            Span::raw(" Deduplicating patient records…"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "This can take a few minutes for large files.",
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Processing"));
    f.render_widget(p, area);
}

fn draw_results(area: Rect, f: &mut Frame, state: &UiState) {
    let mut lines = vec![Line::from("")];
    let saved = matches!(
        state.presentation.save_banner(),
        Some(SaveBanner::Saved(_))
    );

    match state.presentation.save_banner() {
        Some(SaveBanner::Saved(path)) => {
            lines.push(alert("Results file downloaded!".to_string(), Color::Green));
            lines.push(Line::from(format!("Saved to {}", path.display())));
            lines.push(Line::from(""));
            lines.push(Line::from(
                "Open the spreadsheet and group rows by cluster_id: records sharing a \
                 cluster_id were matched as the same patient.",
            ));
        }
        Some(SaveBanner::SaveFailed) => {
            lines.push(alert("Results file failed to save.".to_string(), Color::Red));
        }
        None => {
            lines.push(Line::from("Your results are ready."));
            if let Some(path) = state.presentation.result_path() {
                lines.push(Line::from(Span::styled(
                    format!("Results file: {}", path.display()),
                    Style::default().fg(Color::Gray),
                )));
            }
        }
    }
    lines.push(Line::from(""));

    if let Some(prompt) = &state.prompt {
        lines.push(Line::from(vec![
            Span::styled("Save as: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}▏", prompt.input),
                Style::default().fg(Color::White),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("enter", Style::default().fg(Color::Magenta)),
            Span::raw(" save   "),
            Span::styled("esc", Style::default().fg(Color::Magenta)),
            Span::raw(" cancel"),
        ]));
    } else if state.presentation.is_saving() {
        lines.push(Line::from("Saving…"));
    } else {
        let mut keys = Vec::new();
        if !saved {
            keys.push(Span::styled("s", Style::default().fg(Color::Magenta)));
            keys.push(Span::raw(" save results   "));
        } else {
            keys.push(Span::styled("y", Style::default().fg(Color::Magenta)));
            keys.push(Span::raw(" copy path   "));
        }
        keys.push(Span::styled("h", Style::default().fg(Color::Magenta)));
        keys.push(Span::raw(if saved {
            " load another file into DedupliFHIR   "
        } else {
            " return home   "
        }));
        keys.push(Span::styled("q", Style::default().fg(Color::Magenta)));
        keys.push(Span::raw(" quit"));
        lines.push(Line::from(keys));
    }

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Results"));
    f.render_widget(p, area);
}

fn draw_failed(area: Rect, f: &mut Frame, state: &UiState) {
    let mut lines = vec![
        Line::from(""),
        alert("Something went wrong while deduplicating.".to_string(), Color::Red),
        Line::from(""),
    ];
    if let Some(reason) = state.presentation.failure_reason() {
        let tail: Vec<&str> = reason.lines().collect();
        let start = tail.len().saturating_sub(FAILURE_TAIL_LINES);
        for line in &tail[start..] {
            lines.push(Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(Color::Gray),
            )));
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(vec![
        Span::styled("h", Style::default().fg(Color::Magenta)),
        Span::raw(" return home   "),
        Span::styled("q", Style::default().fg(Color::Magenta)),
        Span::raw(" quit"),
    ]));

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Error"));
    f.render_widget(p, area);
}
