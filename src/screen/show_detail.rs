use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::catalog::CatalogError;
use crate::model::{Episode, Schedule, Show};
use crate::sync::{EpisodesSynchronizer, SeasonEpisodes, ShowsSynchronizer};

use super::nav::{Destination, NavigationEvent, Navigator};
use super::{Observable, Screen, ScreenCore, UiState};

#[derive(Debug, Clone, PartialEq)]
pub struct ShowDetailsUi {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub summary: String,
    pub genres: Vec<String>,
    pub schedule: Schedule,
    pub image: String,
    pub is_favorite: bool,
    pub rating: f32,
}

impl ShowDetailsUi {
    pub const EMPTY: Self = Self {
        id: 0,
        api_id: 0,
        name: String::new(),
        summary: String::new(),
        genres: Vec::new(),
        schedule: Schedule {
            time: String::new(),
            days: Vec::new(),
        },
        image: String::new(),
        is_favorite: false,
        rating: 0.0,
    };
}

impl From<Show> for ShowDetailsUi {
    fn from(show: Show) -> Self {
        Self {
            id: show.local_id,
            api_id: show.api_id,
            name: show.name,
            summary: show.summary,
            genres: show.genres,
            schedule: show.schedule,
            image: show.images.original,
            is_favorite: show.is_favorite,
            rating: show.rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeUi {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub rating: f32,
}

impl From<Episode> for EpisodeUi {
    fn from(episode: Episode) -> Self {
        Self {
            id: episode.id,
            name: episode.name,
            image: episode.image.medium,
            rating: episode.rating,
        }
    }
}

pub type SeasonEpisodesUi = BTreeMap<i64, Vec<EpisodeUi>>;

#[derive(Clone)]
pub struct ShowDetailScreen {
    core: ScreenCore,
    shows_sync: Arc<ShowsSynchronizer>,
    episodes_sync: Arc<EpisodesSynchronizer>,
    show: Observable<ShowDetailsUi>,
    episodes: Observable<SeasonEpisodesUi>,
}

impl ShowDetailScreen {
    pub fn new(
        navigator: Navigator,
        shows_sync: Arc<ShowsSynchronizer>,
        episodes_sync: Arc<EpisodesSynchronizer>,
    ) -> Self {
        Self {
            core: ScreenCore::new("show-detail", navigator),
            shows_sync,
            episodes_sync,
            show: Observable::new(ShowDetailsUi::EMPTY),
            episodes: Observable::new(SeasonEpisodesUi::new()),
        }
    }

    pub fn show(&self) -> &Observable<ShowDetailsUi> {
        &self.show
    }

    pub fn episodes(&self) -> &Observable<SeasonEpisodesUi> {
        &self.episodes
    }

    pub fn on_favourite_clicked(&self) {
        let current = self.show.get();
        if current.id == 0 {
            return;
        }

        let this = self.clone();
        self.core.launch("toggle-favorite", move || {
            let is_favorite = !current.is_favorite;
            match this.shows_sync.toggle_show_favorite(current.id, is_favorite)? {
                Some(updated) => {
                    this.core.publish(&this.show, ShowDetailsUi::from(updated));
                    let message = if is_favorite {
                        "Added to favorites"
                    } else {
                        "Removed from favorites"
                    };
                    this.core.set_state(UiState::Success(message.to_string()));
                }
                None => this
                    .core
                    .set_state(UiState::Error(format!("Show id {} not found", current.id))),
            }
            Ok(())
        });
    }

    pub fn on_episode_clicked(&self, id: i64) {
        self.core
            .navigate(NavigationEvent::To(Destination::EpisodeDetails(id)));
    }

    fn load(&self, id: Option<i64>, force_refresh: bool) -> Result<()> {
        let Some(id) = id else {
            self.core.fail_and_leave("No show id provided".to_string());
            return Ok(());
        };
        let Some(show) = self.shows_sync.get_show(id)? else {
            self.core.fail_and_leave(format!("Show id {id} not found"));
            return Ok(());
        };

        let api_id = show.api_id;
        self.core.publish(&self.show, ShowDetailsUi::from(show));

        // Episodes are secondary: a catalog failure leaves them empty.
        match self.episodes_sync.get_episodes_with(api_id, force_refresh) {
            Ok(groups) => self.core.publish(&self.episodes, to_ui(groups)),
            Err(err) if err.downcast_ref::<CatalogError>().is_some() => {
                warn!(api_id, "episodes unavailable: {err:#}");
            }
            Err(err) => return Err(err),
        }

        self.core.set_state(UiState::Idle);
        Ok(())
    }
}

impl Screen for ShowDetailScreen {
    /// Local id of the show.
    type Seed = i64;

    fn core(&self) -> &ScreenCore {
        &self.core
    }

    fn initialize(&self, seed: Option<i64>) {
        if !self.core.begin_initialize() {
            return;
        }
        self.core.set_state(UiState::Loading);
        let this = self.clone();
        self.core.launch("initialize", move || this.load(seed, false));
    }

    fn refresh(&self) {
        self.core.set_state(UiState::Refreshing);
        let id = self.show.get().id;
        if id == 0 {
            self.core.set_state(UiState::Idle);
            return;
        }
        let this = self.clone();
        self.core.launch("refresh", move || this.load(Some(id), true));
    }
}

fn to_ui(groups: SeasonEpisodes) -> SeasonEpisodesUi {
    groups
        .into_iter()
        .map(|(season, episodes)| {
            (
                season,
                episodes.into_iter().map(EpisodeUi::from).collect(),
            )
        })
        .collect()
}
