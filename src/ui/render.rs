//! Kiosk screen drawing

use super::app::{App, Screen, Tone};
use crate::services::CoordinatorState;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

pub fn draw_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Screen body
            Constraint::Length(3), // Key hints
        ])
        .split(f.area());

    draw_header(f, chunks[0], app);

    match app.screen() {
        Screen::MainMenu => draw_main_menu(f, chunks[1]),
        Screen::VisitValuePrompt { input, error } => draw_prompt(
            f,
            chunks[1],
            "Check-in",
            "Number of visits per check-in:",
            input,
            error.as_deref(),
        ),
        Screen::CheckIn => draw_check_in(f, chunks[1], app),
        Screen::EnrollConfirm { card_id } => draw_prompt(
            f,
            chunks[1],
            "Unknown card",
            "This card was not found in the database. Add it now? (y/n)",
            card_id.as_str(),
            None,
        ),
        Screen::EnrollName { input, .. } => draw_prompt(
            f,
            chunks[1],
            "Add card",
            "User ID for this card (empty to cancel):",
            input,
            None,
        ),
        Screen::VisitsFilterPrompt { input } => draw_prompt(
            f,
            chunks[1],
            "Visits",
            "User ID to show (empty for everyone):",
            input,
            None,
        ),
        Screen::Visits => draw_visits(f, chunks[1], app),
    }

    draw_footer(f, chunks[2], app.screen());

    if let Some(message) = app.dialog() {
        draw_dialog(f, message);
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{} Attendance Tracker ", app.site_name()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::raw(format!("v{}", env!("CARGO_PKG_VERSION"))),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn draw_main_menu(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("[1] ", Style::default().fg(Color::Yellow)),
            Span::raw("Check-in"),
        ]),
        Line::from(vec![
            Span::styled("[2] ", Style::default().fg(Color::Yellow)),
            Span::raw("Show visits"),
        ]),
        Line::from(vec![
            Span::styled("[q] ", Style::default().fg(Color::Yellow)),
            Span::raw("Quit"),
        ]),
    ];

    let menu = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().title(" Main menu ").borders(Borders::ALL));
    f.render_widget(menu, area);
}

fn draw_prompt(
    f: &mut Frame,
    area: Rect,
    title: &str,
    question: &str,
    input: &str,
    error: Option<&str>,
) {
    let mut lines = vec![
        Line::from(""),
        Line::from(question.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            format!("> {}", input),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
    ];
    if let Some(error) = error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))));
    }

    let prompt = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().title(format!(" {} ", title)).borders(Borders::ALL));
    f.render_widget(prompt, area);
}

fn draw_check_in(f: &mut Frame, area: Rect, app: &App) {
    let banner = app.banner();
    let color = match banner.tone {
        Tone::Neutral => Color::White,
        Tone::Good => Color::Green,
        Tone::Bad => Color::Red,
    };

    let state = app.coordinator().state();
    let state_color = match state {
        CoordinatorState::Idle => Color::Green,
        CoordinatorState::AwaitingResult => Color::Yellow,
        CoordinatorState::CoolingDown => Color::DarkGray,
    };

    let top_pad = area.height.saturating_sub(6) / 2;
    let mut lines: Vec<Line> = (0..top_pad).map(|_| Line::from("")).collect();
    lines.push(Line::from(Span::styled(
        banner.text.clone(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("+", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.coordinator().visit_increment().to_string(),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(" per check-in | ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.as_str(), Style::default().fg(state_color)),
    ]));

    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(" Check-in ").borders(Borders::ALL));
    f.render_widget(body, area);
}

fn draw_visits(f: &mut Frame, area: Rect, app: &App) {
    let visits = app.visits();
    let title = match &visits.filter {
        Some(person) => format!(" Visits: {} ", person),
        None => " Visits ".to_string(),
    };

    if visits.loading {
        let loading = Paragraph::new("Loading...")
            .alignment(Alignment::Center)
            .block(Block::default().title(title).borders(Borders::ALL));
        f.render_widget(loading, area);
        return;
    }

    let rows: Vec<Row> = visits
        .rows
        .iter()
        .map(|total| Row::new(vec![total.person_id.to_string(), total.visits.to_string()]))
        .collect();

    let table = Table::new(rows, [Constraint::Percentage(70), Constraint::Percentage(30)])
        .header(
            Row::new(vec!["User", "Visits"])
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(table, area);
}

fn draw_footer(f: &mut Frame, area: Rect, screen: &Screen) {
    let hint = match screen {
        Screen::MainMenu => "1/2 select | q quit",
        Screen::CheckIn => "Swipe a card | Esc back",
        Screen::EnrollConfirm { .. } => "y add card | n/Esc skip",
        Screen::Visits => "Esc back",
        _ => "Enter confirm | Esc back",
    };

    let footer = Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray)))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

fn draw_dialog(f: &mut Frame, message: &str) {
    let area = centered(f.area(), 60, 7);
    let dialog = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from(Span::styled("Press any key", Style::default().fg(Color::DarkGray))),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::default().title(" Notice ").borders(Borders::ALL));

    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

/// Rectangle of `percent_x` width and `height` rows centred in `area`
fn centered(area: Rect, percent_x: u16, height: u16) -> Rect {
    let width = area.width * percent_x / 100;
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height: height.min(area.height),
    }
}
