use std::sync::Arc;

use anyhow::Result;

use crate::model::Show;
use crate::sync::{EpisodesSynchronizer, ShowsSynchronizer};

use super::nav::{Destination, NavigationEvent, Navigator};
use super::{Observable, Screen, ScreenCore, UiState};

#[derive(Debug, Clone, PartialEq)]
pub struct ShowUi {
    pub id: i64,
    pub name: String,
    pub summary: String,
    pub image: String,
    pub rating: f32,
    pub is_favorite: bool,
}

impl From<Show> for ShowUi {
    fn from(show: Show) -> Self {
        Self {
            id: show.local_id,
            name: show.name,
            summary: show.summary,
            image: show.images.medium,
            rating: show.rating,
            is_favorite: show.is_favorite,
        }
    }
}

/// Landing screen after the PIN gate: the show list, favorites and search.
#[derive(Clone)]
pub struct HomeScreen {
    core: ScreenCore,
    shows_sync: Arc<ShowsSynchronizer>,
    episodes_sync: Arc<EpisodesSynchronizer>,
    search_query: Observable<String>,
    shows: Observable<Vec<ShowUi>>,
    favorites: Observable<Vec<ShowUi>>,
}

impl HomeScreen {
    pub fn new(
        navigator: Navigator,
        shows_sync: Arc<ShowsSynchronizer>,
        episodes_sync: Arc<EpisodesSynchronizer>,
    ) -> Self {
        Self {
            core: ScreenCore::new("home", navigator),
            shows_sync,
            episodes_sync,
            search_query: Observable::new(String::new()),
            shows: Observable::new(Vec::new()),
            favorites: Observable::new(Vec::new()),
        }
    }

    pub fn search_query(&self) -> &Observable<String> {
        &self.search_query
    }

    pub fn shows(&self) -> &Observable<Vec<ShowUi>> {
        &self.shows
    }

    pub fn favorites(&self) -> &Observable<Vec<ShowUi>> {
        &self.favorites
    }

    pub fn on_search_query_changed(&self, query: &str) {
        let query = query.to_string();
        self.core.publish(&self.search_query, query.clone());
        self.core.publish(&self.shows, Vec::new());

        let this = self.clone();
        self.core.launch("search", move || {
            let found = this.shows_sync.search_shows_by_name(&query)?;
            // A newer keystroke owns the list now.
            if this.search_query.get() == query {
                this.core.publish(&this.shows, to_ui(found));
            }
            Ok(())
        });
    }

    pub fn on_show_clicked(&self, id: i64) {
        self.core.publish(&self.search_query, String::new());
        self.core
            .navigate(NavigationEvent::To(Destination::ShowDetails(id)));
    }

    pub fn on_favourite_clicked(&self, id: i64) {
        let Some(current) = self.shows.get().into_iter().find(|show| show.id == id) else {
            return;
        };

        let this = self.clone();
        self.core.launch("toggle-favorite", move || {
            this.shows_sync
                .toggle_show_favorite(id, !current.is_favorite)?;
            this.republish()
        });
    }

    /// Re-reads the store when the screen is shown again after a detail screen.
    pub fn on_resume(&self) {
        let this = self.clone();
        self.core.launch("resume", move || this.republish());
    }

    /// Publishes the cached list, keeping an active search filter.
    fn republish(&self) -> Result<()> {
        let query = self.search_query.get();
        let cached = self.shows_sync.get_cached_shows()?;
        if query.is_empty() {
            self.update_data(cached);
        } else {
            let found = self.shows_sync.search_shows_by_name(&query)?;
            self.core.publish(&self.shows, to_ui(found));
            self.publish_favorites(&cached);
        }
        Ok(())
    }

    fn load(&self, force_refresh: bool) -> Result<()> {
        let shows = self.shows_sync.get_shows(force_refresh)?;
        self.update_data(shows);
        self.core.set_state(UiState::Idle);
        Ok(())
    }

    /// Favorites go out last so observers of that cell see a settled list.
    fn update_data(&self, shows: Vec<Show>) {
        let favorites = shows.clone();
        self.core.publish(&self.shows, to_ui(shows));
        self.publish_favorites(&favorites);
    }

    fn publish_favorites(&self, shows: &[Show]) {
        let mut favorites = shows
            .iter()
            .filter(|show| show.is_favorite)
            .cloned()
            .map(ShowUi::from)
            .collect::<Vec<_>>();
        favorites.sort_by(|a, b| a.name.cmp(&b.name));
        self.core.publish(&self.favorites, favorites);
    }
}

impl Screen for HomeScreen {
    type Seed = ();

    fn core(&self) -> &ScreenCore {
        &self.core
    }

    fn initialize(&self, _seed: Option<()>) {
        if !self.core.begin_initialize() {
            return;
        }
        self.core.set_state(UiState::Loading);
        let this = self.clone();
        self.core.launch("initialize", move || this.load(false));
    }

    fn refresh(&self) {
        self.core.set_state(UiState::Refreshing);
        self.core.publish(&self.shows, Vec::new());
        self.core.publish(&self.search_query, String::new());

        let this = self.clone();
        self.core.launch("refresh", move || {
            this.episodes_sync.clear()?;
            this.load(true)
        });
    }

    /// Home is the first screen behind the gate, so back leaves the app.
    fn on_back_pressed(&self) {
        self.core.navigate(NavigationEvent::Quit);
    }
}

fn to_ui(shows: Vec<Show>) -> Vec<ShowUi> {
    shows.into_iter().map(ShowUi::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::testing::{Backend, WAIT, backend};
    use crate::sync::testing::{FakeCatalog, episode_record, season, show_record};

    fn catalog() -> FakeCatalog {
        FakeCatalog::with_shows(vec![
            show_record(1, "Under the Dome"),
            show_record(2, "Person of Interest"),
            show_record(3, "Arrow"),
        ])
    }

    fn ready_home(backend: &Backend, navigator: &Navigator) -> HomeScreen {
        let home = HomeScreen::new(
            navigator.clone(),
            Arc::clone(&backend.shows),
            Arc::clone(&backend.episodes),
        );
        home.initialize(None);
        home.core
            .state()
            .wait_for(WAIT, |state| *state == UiState::Idle)
            .expect("home should finish loading");
        home
    }

    fn names(shows: &[ShowUi]) -> Vec<&str> {
        shows.iter().map(|show| show.name.as_str()).collect()
    }

    #[test]
    fn initialize_loads_shows_and_ends_idle() {
        let backend = backend(catalog());
        let navigator = Navigator::default();
        let home = HomeScreen::new(
            navigator,
            Arc::clone(&backend.shows),
            Arc::clone(&backend.episodes),
        );
        assert_eq!(home.state(), UiState::Idle);

        home.initialize(None);
        home.initialize(None);

        let state = home
            .core
            .state()
            .wait_for(WAIT, |state| *state == UiState::Idle && home.shows.version() > 0);
        assert_eq!(state, Some(UiState::Idle));
        assert_eq!(home.shows.get().len(), 3);
        assert!(home.favorites.get().is_empty());
        assert_eq!(backend.catalog.calls().0, 1);
    }

    #[test]
    fn catalog_failure_on_first_load_is_an_error_and_stays() {
        let failing = catalog();
        failing.fail_with(Some(500));
        let backend = backend(failing);
        let navigator = Navigator::default();
        let nav_events = navigator.subscribe();
        let home = HomeScreen::new(
            navigator,
            Arc::clone(&backend.shows),
            Arc::clone(&backend.episodes),
        );

        home.initialize(None);

        let state = home
            .core
            .state()
            .wait_for(WAIT, |state| matches!(state, UiState::Error(_)))
            .expect("error state");
        assert!(matches!(state, UiState::Error(message) if message.contains("HTTP status 500")));
        home.on_error_dismiss();
        assert_eq!(home.state(), UiState::Idle);
        assert!(nav_events.try_recv().is_err());
    }

    #[test]
    fn favourite_click_flips_flag_and_sorts_favorites_by_name() {
        let backend = backend(catalog());
        let navigator = Navigator::default();
        let home = ready_home(&backend, &navigator);
        let ids = home.shows.get().iter().map(|show| show.id).collect::<Vec<_>>();

        home.on_favourite_clicked(ids[0]);
        home.favorites
            .wait_for(WAIT, |favorites| favorites.len() == 1)
            .expect("first favorite");
        home.on_favourite_clicked(ids[2]);
        let favorites = home
            .favorites
            .wait_for(WAIT, |favorites| favorites.len() == 2)
            .expect("second favorite");

        assert_eq!(names(&favorites), vec!["Arrow", "Under the Dome"]);
        let shows = home.shows.get();
        assert!(shows[0].is_favorite && !shows[1].is_favorite && shows[2].is_favorite);

        home.on_favourite_clicked(ids[0]);
        let favorites = home
            .favorites
            .wait_for(WAIT, |favorites| favorites.len() == 1)
            .expect("unfavorite");
        assert_eq!(names(&favorites), vec!["Arrow"]);
    }

    #[test]
    fn favourite_click_on_unlisted_id_does_nothing() {
        let backend = backend(catalog());
        let home = ready_home(&backend, &Navigator::default());
        let version = home.favorites.version();

        home.on_favourite_clicked(-5);

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(home.favorites.version(), version);
    }

    #[test]
    fn search_filters_and_keeps_filter_after_favourite_toggle() {
        let backend = backend(catalog());
        let home = ready_home(&backend, &Navigator::default());

        home.on_search_query_changed("er");
        let found = home
            .shows
            .wait_for(WAIT, |shows| shows.len() == 2)
            .expect("search results");
        assert_eq!(names(&found), vec!["Under the Dome", "Person of Interest"]);
        assert_eq!(home.search_query.get(), "er");

        home.on_favourite_clicked(found[1].id);
        home.favorites
            .wait_for(WAIT, |favorites| favorites.len() == 1)
            .expect("favorite added");
        let shows = home
            .shows
            .wait_for(WAIT, |shows| shows.iter().any(|show| show.is_favorite))
            .expect("list republished");
        assert_eq!(shows.len(), 2);
    }

    #[test]
    fn show_click_clears_query_and_navigates() {
        let backend = backend(catalog());
        let navigator = Navigator::default();
        let nav_events = navigator.subscribe();
        let home = ready_home(&backend, &navigator);
        home.on_search_query_changed("Arrow");

        home.on_show_clicked(42);

        assert_eq!(home.search_query.get(), "");
        assert_eq!(
            nav_events.recv_timeout(WAIT),
            Ok(NavigationEvent::To(Destination::ShowDetails(42)))
        );
    }

    #[test]
    fn refresh_forces_sync_clears_episode_cache_and_keeps_favorites() {
        let catalog = catalog();
        catalog.add_season(1, season(10, 1), vec![episode_record(100, 1, 1)]);
        let backend = backend(catalog);
        let home = ready_home(&backend, &Navigator::default());
        backend.episodes.get_episodes(1).expect("warm episode cache");
        let dome = home.shows.get()[0].clone();
        home.on_favourite_clicked(dome.id);
        home.favorites
            .wait_for(WAIT, |favorites| favorites.len() == 1)
            .expect("favorite");

        home.refresh();
        home.core
            .state()
            .wait_for(WAIT, |state| *state == UiState::Idle)
            .expect("refresh completes");

        assert_eq!(backend.catalog.calls().0, 2);
        assert!(backend.episodes.get_cached_episodes(1).expect("cached").is_empty());
        let favorites = home.favorites.get();
        assert_eq!(names(&favorites), vec!["Under the Dome"]);
        assert_ne!(favorites[0].id, dome.id);
    }

    #[test]
    fn resume_picks_up_favorites_changed_elsewhere() {
        let backend = backend(catalog());
        let home = ready_home(&backend, &Navigator::default());
        let arrow = home.shows.get()[2].clone();
        backend
            .shows
            .toggle_show_favorite(arrow.id, true)
            .expect("toggle from another screen");

        home.on_resume();

        let favorites = home
            .favorites
            .wait_for(WAIT, |favorites| favorites.len() == 1)
            .expect("favorites reloaded");
        assert_eq!(favorites[0].id, arrow.id);
        assert!(home.shows.get()[2].is_favorite);
        assert_eq!(backend.catalog.calls().0, 1);
    }

    #[test]
    fn back_quits_the_app() {
        let backend = backend(catalog());
        let navigator = Navigator::default();
        let nav_events = navigator.subscribe();
        let home = ready_home(&backend, &navigator);

        home.on_back_pressed();

        assert_eq!(nav_events.recv_timeout(WAIT), Ok(NavigationEvent::Quit));
    }

    #[test]
    fn closed_screen_ignores_late_results() {
        let slow = FakeCatalog {
            latency: Some(std::time::Duration::from_millis(100)),
            ..catalog()
        };
        let backend = backend(slow);
        let home = HomeScreen::new(
            Navigator::default(),
            Arc::clone(&backend.shows),
            Arc::clone(&backend.episodes),
        );

        home.initialize(None);
        home.close();
        std::thread::sleep(std::time::Duration::from_millis(300));

        assert_eq!(home.state(), UiState::Loading);
        assert_eq!(home.shows.version(), 0);
        assert_eq!(backend.shows.get_cached_shows().expect("stored").len(), 3);
    }
}
