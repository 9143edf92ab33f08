use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::modules::notifications::NotificationRecord;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(4),
        ])
        .split(f.area());

    draw_title(f, chunks[0], app);
    draw_notifications(f, app, chunks[1]);
    draw_status(f, app, chunks[2]);

    if app.show_help {
        draw_help_popup(f);
    }
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let time_str = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let feed = app
        .events_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "no feed".to_string());
    let mut header = format!(
        "solvefeed | {} | {} | flags: {} | countries: {}",
        time_str,
        feed,
        on_off(app.controller.show_ctf_flags()),
        on_off(app.controller.show_country_details()),
    );
    let dropped = app.controller.dropped_events();
    if dropped > 0 { header.push_str(&format!(" | dropped: {}", dropped)); }

    let title = Paragraph::new(header)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn draw_notifications(f: &mut Frame, app: &App, area: Rect) {
    let notifications = app.controller.notifications();
    let title = format!("Notifications ({})", notifications.len());

    if notifications.is_empty() {
        let empty = Paragraph::new("No notifications yet")
            .block(Block::default().title(title).borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    // each record takes up to three lines
    let window = (area.height.saturating_sub(2) as usize / 3).max(1);
    let start = app.selected_index.saturating_sub(window / 2);
    let end = usize::min(start + window, notifications.len());

    let show_flags = app.controller.show_ctf_flags();
    let show_country = app.controller.show_country_details();
    let items: Vec<ListItem> = notifications[start..end]
        .iter()
        .enumerate()
        .map(|(offset, n)| {
            let i = start + offset;
            let has_coding = app.controller.has_coding_challenge(n);
            notification_item(n, i == app.selected_index, show_flags, show_country, has_coding)
        })
        .collect();

    let list = List::new(items).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(list, area);
}

fn notification_item(
    n: &NotificationRecord,
    selected: bool,
    show_flags: bool,
    show_country: bool,
    has_coding: bool,
) -> ListItem<'static> {
    let style = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let mut head = vec![
        Span::styled(format!("[{}] ", n.received_at.format("%H:%M:%S")), Style::default().fg(Color::DarkGray)),
        Span::styled(n.message.clone(), style),
    ];
    if has_coding {
        head.push(Span::styled(" </>", Style::default().fg(Color::Magenta)));
    }
    let mut lines = vec![Line::from(head)];

    if show_flags && !n.flag.is_empty() {
        let marker = if n.copied { " ✓ copied" } else { "" };
        lines.push(Line::from(vec![
            Span::raw("    flag: "),
            Span::styled(n.flag.clone(), Style::default().fg(Color::Green)),
            Span::styled(marker, Style::default().fg(Color::DarkGray)),
        ]));
    }
    if show_country {
        if let Some(country) = &n.country {
            lines.push(Line::from(format!("    country: {} ({})", country.name, country.code)));
        }
    }
    ListItem::new(lines)
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let help_text = "q: Quit | ↑↓/jk: Navigate | d: Dismiss | D: Dismiss all | y: Copy flag | Enter: Coding challenge | f: Flags | c: Countries | ?: Help";

    let status = Paragraph::new(vec![
        Line::from(app.status_message.as_str()),
        Line::from(help_text),
    ])
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn draw_help_popup(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());
    let help = "solvefeed Help\n\nKeys:\n  q: Quit\n  j/k or ↑/↓: Navigate\n  Home/End: Jump\n  d: Dismiss selected notification\n  D: Dismiss all notifications\n  y: Copy flag to clipboard and keep it as continue code\n  Enter: Open the coding challenge on the score board\n  f: Toggle CTF flag display\n  c: Toggle country details\n  ?: Toggle this help";

    let paragraph = Paragraph::new(help)
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(paragraph, area);
}
