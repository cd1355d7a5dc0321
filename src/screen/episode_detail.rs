use std::sync::Arc;

use anyhow::Result;

use crate::model::Episode;
use crate::sync::EpisodesSynchronizer;

use super::nav::Navigator;
use super::{Observable, Screen, ScreenCore, UiState};

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeDetailsUi {
    pub id: i64,
    pub name: String,
    pub summary: String,
    pub image: String,
    pub rating: f32,
}

impl EpisodeDetailsUi {
    pub const EMPTY: Self = Self {
        id: 0,
        name: String::new(),
        summary: String::new(),
        image: String::new(),
        rating: 0.0,
    };
}

impl From<Episode> for EpisodeDetailsUi {
    fn from(episode: Episode) -> Self {
        Self {
            id: episode.id,
            name: episode.name,
            summary: episode.summary,
            image: episode.image.original,
            rating: episode.rating,
        }
    }
}

#[derive(Clone)]
pub struct EpisodeDetailScreen {
    core: ScreenCore,
    episodes_sync: Arc<EpisodesSynchronizer>,
    episode: Observable<EpisodeDetailsUi>,
}

impl EpisodeDetailScreen {
    pub fn new(navigator: Navigator, episodes_sync: Arc<EpisodesSynchronizer>) -> Self {
        Self {
            core: ScreenCore::new("episode-detail", navigator),
            episodes_sync,
            episode: Observable::new(EpisodeDetailsUi::EMPTY),
        }
    }

    pub fn episode(&self) -> &Observable<EpisodeDetailsUi> {
        &self.episode
    }

    fn load(&self, id: Option<i64>) -> Result<()> {
        let Some(id) = id else {
            self.core.fail_and_leave("No episode id provided".to_string());
            return Ok(());
        };
        let Some(episode) = self.episodes_sync.get_episode(id)? else {
            self.core.fail_and_leave(format!("Episode id {id} not found"));
            return Ok(());
        };
        self.core.publish(&self.episode, EpisodeDetailsUi::from(episode));
        self.core.set_state(UiState::Idle);
        Ok(())
    }
}

impl Screen for EpisodeDetailScreen {
    /// Local id of the episode.
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
        self.core.launch("initialize", move || this.load(seed));
    }

    /// Episodes only change with their show's sync, so this re-reads the store.
    fn refresh(&self) {
        self.core.set_state(UiState::Refreshing);
        let id = self.episode.get().id;
        if id == 0 {
            self.core.set_state(UiState::Idle);
            return;
        }
        let this = self.clone();
        self.core.launch("refresh", move || this.load(Some(id)));
    }
}
