use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Padding, Paragraph, Row, Table, Wrap,
};

use crate::screen::UiState;
use crate::screen::pin::{PadInput, PIN_LENGTH, PinCodeMode};

use super::super::format::{format_rating, format_schedule, strip_markup, truncate};
use super::{
    ActiveScreen, EpisodeDetailView, HomeTab, HomeView, Notice, PinView, ShowDetailView,
};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const TEXT: Color = Color::Rgb(230, 230, 230);

pub(super) fn draw_tui(frame: &mut Frame, screen: &mut ActiveScreen, notice: Option<&Notice>) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let state = screen.state();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "TVTRACK",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(screen.title(), Style::default().fg(MUTED)),
        Span::styled("   ", Style::default()),
        Span::styled(header_detail(screen), Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"));
    frame.render_widget(header, chunks[0]);

    let controls = match screen {
        ActiveScreen::Pin(view) => {
            draw_pin(frame, chunks[1], view);
            "0-9 type  Backspace clear  Enter accept  c change PIN  q quit"
        }
        ActiveScreen::Home(view) => {
            draw_home(frame, chunks[1], view);
            if view.searching {
                "type to filter  Backspace delete  Enter/Esc done"
            } else {
                "↑/↓ move  Enter open  f favorite  / search  Tab all/favorites  r refresh  q quit"
            }
        }
        ActiveScreen::ShowDetail(view) => {
            draw_show_detail(frame, chunks[1], view);
            "↑/↓ move  Enter episode  f favorite  r refresh  Esc back"
        }
        ActiveScreen::EpisodeDetail(view) => {
            draw_episode_detail(frame, chunks[1], view);
            "r reload  Esc back"
        }
    };
    let command_bar = Paragraph::new(Span::styled(controls, Style::default().fg(MUTED)))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[2]);

    let status = status_text(&state);
    let status_widget = Paragraph::new(status.clone())
        .style(status_style(&status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(notice) = notice {
        let (title, message) = match &notice.state {
            UiState::Error(message) => ("Error", message.as_str()),
            UiState::Success(message) => ("Done", message.as_str()),
            _ => return,
        };
        let popup_text = format!("{}\n\nPress any key to continue.", truncate(message, 200));
        let popup_area = popup_rect_for_text(frame.area(), &popup_text);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(popup_text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block(title));
        frame.render_widget(popup, popup_area);
    }
}

fn header_detail(screen: &ActiveScreen) -> String {
    match screen {
        ActiveScreen::Pin(view) => match view.screen.mode().get() {
            PinCodeMode::SetNewPinCode => "set a new PIN".to_string(),
            PinCodeMode::EnterPinCode => "enter your PIN".to_string(),
        },
        ActiveScreen::Home(view) => format!(
            "{} shows   {} favorites",
            view.screen.shows().get().len(),
            view.screen.favorites().get().len()
        ),
        ActiveScreen::ShowDetail(view) => truncate(&view.screen.show().get().name, 40),
        ActiveScreen::EpisodeDetail(view) => truncate(&view.screen.episode().get().name, 40),
    }
}

fn draw_pin(frame: &mut Frame, area: Rect, view: &PinView) {
    let entered = view.screen.pin_code().get().chars().count();
    let dots = (0..PIN_LENGTH)
        .map(|idx| if idx < entered { "●" } else { "○" })
        .collect::<Vec<_>>()
        .join(" ");

    let mut lines = vec![
        Line::from(Span::styled(
            dots,
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for row in view.screen.layout().get() {
        let mut spans = Vec::new();
        for key in row {
            let label = match key {
                PadInput::Symbol(symbol) => format!("  {symbol}  "),
                PadInput::Clear(_) => " CLR ".to_string(),
                PadInput::Accept(_) => " OK  ".to_string(),
            };
            let style = if key.is_enabled() {
                highlight_style()
            } else {
                pill_inactive()
            };
            spans.push(Span::styled(label, style));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
        lines.push(Line::from(""));
    }
    if view.invalid_since.is_some() {
        lines.push(Line::from(Span::styled(
            "Wrong PIN",
            Style::default()
                .fg(Color::Rgb(255, 145, 120))
                .add_modifier(Modifier::BOLD),
        )));
    }

    let keypad = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(panel_block("Keypad"));
    frame.render_widget(keypad, centered_fixed_rect(40, 16, area));
}

fn draw_home(frame: &mut Frame, area: Rect, view: &mut HomeView) {
    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    let query = view.screen.search_query().get();
    let search_style = if view.searching {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(MUTED)
    };
    let search_text = if query.is_empty() && !view.searching {
        "press / to search".to_string()
    } else if view.searching {
        format!("{query}_")
    } else {
        query
    };
    let search = Paragraph::new(search_text)
        .style(search_style)
        .block(panel_block("Search"));
    frame.render_widget(search, body[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(body[1]);

    let shows = view.visible_shows();
    let rows: Vec<Row> = shows
        .iter()
        .map(|show| {
            Row::new(vec![
                Cell::from(if show.is_favorite { "★" } else { " " }),
                Cell::from(truncate(&show.name, 48)),
                Cell::from(format_rating(show.rating)),
            ])
        })
        .collect();
    let title = match view.tab {
        HomeTab::All => "Shows",
        HomeTab::Favorites => "Favorites",
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Percentage(80),
            Constraint::Length(7),
        ],
    )
    .header(
        Row::new(vec!["", "Name", "Rating"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(panel_block(title))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, columns[0], &mut view.table);

    let selected_text = match view.table.selected().and_then(|idx| shows.get(idx)) {
        Some(show) => format!(
            "{}\n\nRating\n{}\n\n{}",
            truncate(&show.name, 40),
            format_rating(show.rating),
            strip_markup(&show.summary)
        ),
        None if shows.is_empty() => "No shows cached yet.\n\nPress r to refresh.".to_string(),
        None => String::new(),
    };
    let selected = Paragraph::new(selected_text)
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: true })
        .block(panel_block("Selected"));
    frame.render_widget(selected, columns[1]);
}

fn draw_show_detail(frame: &mut Frame, area: Rect, view: &mut ShowDetailView) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let show = view.screen.show().get();
    let about = format!(
        "{}{}\n\nGenres\n{}\n\nSchedule\n{}\n\nRating\n{}\n\n{}",
        show.name,
        if show.is_favorite { "  ★" } else { "" },
        if show.genres.is_empty() {
            "-".to_string()
        } else {
            show.genres.join(", ")
        },
        format_schedule(&show.schedule),
        format_rating(show.rating),
        strip_markup(&show.summary)
    );
    let about = Paragraph::new(about)
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: true })
        .block(panel_block("About"));
    frame.render_widget(about, columns[0]);

    let rows: Vec<Row> = view
        .rows()
        .into_iter()
        .map(|(season, episode)| {
            Row::new(vec![
                Cell::from(format!("S{season:02}")),
                Cell::from(truncate(&episode.name, 48)),
                Cell::from(format_rating(episode.rating)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Percentage(80),
            Constraint::Length(7),
        ],
    )
    .header(
        Row::new(vec!["", "Episode", "Rating"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(panel_block("Episodes"))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, columns[1], &mut view.table);
}

fn draw_episode_detail(frame: &mut Frame, area: Rect, view: &EpisodeDetailView) {
    let episode = view.screen.episode().get();
    let text = format!(
        "{}\n\nRating\n{}\n\n{}",
        episode.name,
        format_rating(episode.rating),
        strip_markup(&episode.summary)
    );
    let details = Paragraph::new(text)
        .style(Style::default().fg(TEXT))
        .wrap(Wrap { trim: true })
        .block(panel_block("Episode"));
    frame.render_widget(details, area);
}

fn status_text(state: &UiState) -> String {
    match state {
        UiState::Loading => "INFO: Loading...".to_string(),
        UiState::Refreshing => "INFO: Refreshing...".to_string(),
        UiState::Idle => "Ready.".to_string(),
        UiState::Success(message) => format!("INFO: {message}"),
        UiState::Error(message) => format!("ERROR: {message}"),
    }
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn highlight_style() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(120, 128, 140))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 40.min(available_width);
    let max_width = 72.min(available_width);
    let width = max_line_width.saturating_add(8).clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 7.min(available_height);
    let max_height = 14.min(available_height);
    let height = line_count.saturating_add(5).clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_stays_inside_small_terminals() {
        let area = Rect::new(0, 0, 30, 8);
        let popup = popup_rect_for_text(area, "Show id 9 not found\n\nPress any key to continue.");
        assert!(popup.width <= 28 && popup.height <= 6);
        assert!(popup.x + popup.width <= area.width);
        assert!(popup.y + popup.height <= area.height);
    }

    #[test]
    fn status_prefix_follows_state() {
        assert_eq!(status_text(&UiState::Idle), "Ready.");
        assert!(status_text(&UiState::Error("boom".into())).starts_with("ERROR:"));
        assert!(status_text(&UiState::Success("Unlocked!".into())).starts_with("INFO:"));
    }
}
