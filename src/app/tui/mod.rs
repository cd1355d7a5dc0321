mod render;
mod session;

use std::io;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use tracing::info;

use crate::screen::episode_detail::EpisodeDetailScreen;
use crate::screen::home::{HomeScreen, ShowUi};
use crate::screen::nav::{Destination, NavigationEvent, Navigator};
use crate::screen::pin::{PadInput, PinCodeEvent, PinScreen};
use crate::screen::show_detail::{EpisodeUi, ShowDetailScreen};
use crate::screen::{Screen, UiState};

use super::Services;

use self::render::draw_tui;
use self::session::TuiSession;

const NOTICE_TIMEOUT: Duration = Duration::from_secs(3);
const INVALID_PIN_FLASH: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum HomeTab {
    All,
    Favorites,
}

impl HomeTab {
    fn toggle(self) -> Self {
        match self {
            Self::All => Self::Favorites,
            Self::Favorites => Self::All,
        }
    }
}

pub(super) struct PinView {
    pub(super) screen: PinScreen,
    events: Receiver<PinCodeEvent>,
    pub(super) invalid_since: Option<Instant>,
}

pub(super) struct HomeView {
    pub(super) screen: HomeScreen,
    pub(super) tab: HomeTab,
    pub(super) table: TableState,
    pub(super) searching: bool,
}

impl HomeView {
    pub(super) fn visible_shows(&self) -> Vec<ShowUi> {
        match self.tab {
            HomeTab::All => self.screen.shows().get(),
            HomeTab::Favorites => self.screen.favorites().get(),
        }
    }
}

pub(super) struct ShowDetailView {
    pub(super) screen: ShowDetailScreen,
    pub(super) table: TableState,
}

impl ShowDetailView {
    /// Season-ordered episodes, flattened for a single selectable table.
    pub(super) fn rows(&self) -> Vec<(i64, EpisodeUi)> {
        self.screen
            .episodes()
            .get()
            .into_iter()
            .flat_map(|(season, episodes)| episodes.into_iter().map(move |e| (season, e)))
            .collect()
    }
}

pub(super) struct EpisodeDetailView {
    pub(super) screen: EpisodeDetailScreen,
}

pub(super) enum ActiveScreen {
    Pin(PinView),
    Home(HomeView),
    ShowDetail(ShowDetailView),
    EpisodeDetail(EpisodeDetailView),
}

impl ActiveScreen {
    pub(super) fn title(&self) -> &'static str {
        match self {
            Self::Pin(_) => "PIN",
            Self::Home(_) => "Shows",
            Self::ShowDetail(_) => "Show",
            Self::EpisodeDetail(_) => "Episode",
        }
    }

    pub(super) fn state(&self) -> UiState {
        match self {
            Self::Pin(view) => view.screen.state(),
            Self::Home(view) => view.screen.state(),
            Self::ShowDetail(view) => view.screen.state(),
            Self::EpisodeDetail(view) => view.screen.state(),
        }
    }

    fn dismiss_notice(&self) {
        match self {
            Self::Pin(view) => view.screen.on_error_dismiss(),
            Self::Home(view) => view.screen.on_error_dismiss(),
            Self::ShowDetail(view) => view.screen.on_error_dismiss(),
            Self::EpisodeDetail(view) => view.screen.on_error_dismiss(),
        }
    }

    fn close(&self) {
        match self {
            Self::Pin(view) => view.screen.close(),
            Self::Home(view) => view.screen.close(),
            Self::ShowDetail(view) => view.screen.close(),
            Self::EpisodeDetail(view) => view.screen.close(),
        }
    }

    /// Pulls pending transient events and keeps selections in range.
    fn tick(&mut self) {
        match self {
            Self::Pin(view) => {
                while let Ok(event) = view.events.try_recv() {
                    view.invalid_since = match event {
                        PinCodeEvent::InvalidPinCode => Some(Instant::now()),
                        PinCodeEvent::Idle => None,
                    };
                }
                if view
                    .invalid_since
                    .is_some_and(|since| since.elapsed() > INVALID_PIN_FLASH)
                {
                    view.invalid_since = None;
                }
            }
            Self::Home(view) => {
                let len = view.visible_shows().len();
                clamp_selection(&mut view.table, len);
            }
            Self::ShowDetail(view) => {
                let len = view.rows().len();
                clamp_selection(&mut view.table, len);
            }
            Self::EpisodeDetail(_) => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let typing = matches!(self, Self::Home(view) if view.searching);
        // One refresh in flight per screen.
        if !typing && key.code == KeyCode::Char('r') && self.state().is_busy() {
            return;
        }
        match self {
            Self::Pin(view) => handle_pin_key(view, key),
            Self::Home(view) => handle_home_key(view, key),
            Self::ShowDetail(view) => handle_show_detail_key(view, key),
            Self::EpisodeDetail(view) => match key.code {
                KeyCode::Char('r') => view.screen.refresh(),
                KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => {
                    view.screen.on_back_pressed()
                }
                _ => {}
            },
        }
    }
}

/// A `Success` or `Error` state on display, with when it was first seen.
pub(super) struct Notice {
    pub(super) state: UiState,
    since: Instant,
}

struct ScreenStack<'a> {
    services: &'a Services,
    navigator: Navigator,
    screens: Vec<ActiveScreen>,
}

impl ScreenStack<'_> {
    fn open(&mut self, destination: Destination) {
        info!(route = %destination.route(), "opening screen");
        let screen = match destination {
            Destination::PinCode => {
                self.close_all();
                let screen = PinScreen::new(self.navigator.clone(), Arc::clone(&self.services.prefs));
                let events = screen.events();
                screen.initialize(None);
                ActiveScreen::Pin(PinView {
                    screen,
                    events,
                    invalid_since: None,
                })
            }
            Destination::Home => {
                self.close_all();
                let screen = HomeScreen::new(
                    self.navigator.clone(),
                    Arc::clone(&self.services.shows),
                    Arc::clone(&self.services.episodes),
                );
                screen.initialize(None);
                ActiveScreen::Home(HomeView {
                    screen,
                    tab: HomeTab::All,
                    table: TableState::default(),
                    searching: false,
                })
            }
            Destination::ShowDetails(id) => {
                let screen = ShowDetailScreen::new(
                    self.navigator.clone(),
                    Arc::clone(&self.services.shows),
                    Arc::clone(&self.services.episodes),
                );
                screen.initialize(Some(id));
                ActiveScreen::ShowDetail(ShowDetailView {
                    screen,
                    table: TableState::default(),
                })
            }
            Destination::EpisodeDetails(id) => {
                let screen =
                    EpisodeDetailScreen::new(self.navigator.clone(), Arc::clone(&self.services.episodes));
                screen.initialize(Some(id));
                ActiveScreen::EpisodeDetail(EpisodeDetailView { screen })
            }
        };
        self.screens.push(screen);
    }

    /// Returns `false` once the app should exit.
    fn apply(&mut self, event: NavigationEvent) -> bool {
        match event {
            NavigationEvent::To(destination) => self.open(destination),
            NavigationEvent::Back => {
                if let Some(screen) = self.screens.pop() {
                    screen.close();
                }
                // Favorites may have changed on the screen we just left.
                if let Some(ActiveScreen::Home(view)) = self.screens.last() {
                    view.screen.on_resume();
                }
            }
            NavigationEvent::Quit => self.close_all(),
        }
        !self.screens.is_empty()
    }

    fn close_all(&mut self) {
        for screen in self.screens.drain(..).rev() {
            screen.close();
        }
    }
}

pub(crate) fn run_tui(services: &Services) -> Result<()> {
    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let navigator = Navigator::default();
    let nav_events = navigator.subscribe();
    let mut stack = ScreenStack {
        services,
        navigator,
        screens: Vec::new(),
    };
    stack.open(Destination::PinCode);
    let mut notice = None::<Notice>;

    'ui: loop {
        while let Ok(event) = nav_events.try_recv() {
            if !stack.apply(event) {
                break 'ui;
            }
        }
        let Some(top) = stack.screens.last_mut() else {
            break;
        };
        top.tick();

        match top.state() {
            state @ (UiState::Success(_) | UiState::Error(_)) => {
                if notice.as_ref().is_none_or(|shown| shown.state != state) {
                    notice = Some(Notice {
                        state,
                        since: Instant::now(),
                    });
                } else if notice
                    .as_ref()
                    .is_some_and(|shown| shown.since.elapsed() > NOTICE_TIMEOUT)
                {
                    top.dismiss_notice();
                    notice = None;
                }
            }
            _ => notice = None,
        }

        terminal.draw(|frame| draw_tui(frame, top, notice.as_ref()))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if notice.take().is_some() {
            top.dismiss_notice();
            continue;
        }
        top.handle_key(key);
    }

    stack.close_all();
    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

fn handle_pin_key(view: &mut PinView, key: KeyEvent) {
    let layout = view.screen.layout().get();
    match key.code {
        KeyCode::Char(digit) if digit.is_ascii_digit() => {
            view.screen.on_button_pressed(PadInput::Symbol(digit))
        }
        KeyCode::Backspace | KeyCode::Delete => view.screen.on_button_pressed(layout[3][0]),
        KeyCode::Enter => view.screen.on_button_pressed(layout[3][2]),
        KeyCode::Char('c') => view.screen.on_change_pin_code_pressed(),
        KeyCode::Esc | KeyCode::Char('q') => view.screen.on_back_pressed(),
        _ => {}
    }
}

fn handle_home_key(view: &mut HomeView, key: KeyEvent) {
    if view.searching {
        let mut query = view.screen.search_query().get();
        match key.code {
            KeyCode::Esc | KeyCode::Enter => view.searching = false,
            KeyCode::Backspace => {
                query.pop();
                view.screen.on_search_query_changed(&query);
            }
            KeyCode::Char(ch) => {
                query.push(ch);
                view.screen.on_search_query_changed(&query);
            }
            _ => {}
        }
        return;
    }

    let shows = view.visible_shows();
    let selected = view.table.selected().and_then(|idx| shows.get(idx));
    match key.code {
        KeyCode::Char('/') => {
            view.tab = HomeTab::All;
            view.searching = true;
        }
        KeyCode::Tab => {
            view.tab = view.tab.toggle();
            view.table.select((!view.visible_shows().is_empty()).then_some(0));
        }
        KeyCode::Up => move_selection(&mut view.table, shows.len(), -1),
        KeyCode::Down => move_selection(&mut view.table, shows.len(), 1),
        KeyCode::Enter => {
            if let Some(show) = selected {
                view.screen.on_show_clicked(show.id);
            }
        }
        KeyCode::Char('f') => {
            if let Some(show) = selected {
                view.screen.on_favourite_clicked(show.id);
            }
        }
        KeyCode::Char('r') => view.screen.refresh(),
        KeyCode::Esc | KeyCode::Char('q') => view.screen.on_back_pressed(),
        _ => {}
    }
}

fn handle_show_detail_key(view: &mut ShowDetailView, key: KeyEvent) {
    let rows = view.rows();
    match key.code {
        KeyCode::Up => move_selection(&mut view.table, rows.len(), -1),
        KeyCode::Down => move_selection(&mut view.table, rows.len(), 1),
        KeyCode::Enter => {
            if let Some((_, episode)) = view.table.selected().and_then(|idx| rows.get(idx)) {
                view.screen.on_episode_clicked(episode.id);
            }
        }
        KeyCode::Char('f') => view.screen.on_favourite_clicked(),
        KeyCode::Char('r') => view.screen.refresh(),
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => view.screen.on_back_pressed(),
        _ => {}
    }
}

fn move_selection(table: &mut TableState, len: usize, step: isize) {
    if len == 0 {
        table.select(None);
        return;
    }
    let current = table.selected().unwrap_or(0);
    let next = current.saturating_add_signed(step).min(len - 1);
    table.select(Some(next));
}

fn clamp_selection(table: &mut TableState, len: usize) {
    match table.selected() {
        _ if len == 0 => table.select(None),
        Some(selected) => table.select(Some(selected.min(len - 1))),
        None => table.select(Some(0)),
    }
}
