use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::catalog::{CatalogClient, EpisodeRecord};
use crate::db::{Database, EpisodeRow};
use crate::model::{Episode, ImageData};
use crate::prefs::Preferences;

use super::{Clock, FreshnessTracker, SyncLocks, SyncSubject, is_stale};

/// Season number to that season's episodes, ascending by episode number.
pub type SeasonEpisodes = BTreeMap<i64, Vec<Episode>>;

pub struct EpisodesSynchronizer {
    catalog: Arc<dyn CatalogClient>,
    db: Arc<Database>,
    freshness: FreshnessTracker,
    clock: Arc<dyn Clock>,
    locks: SyncLocks,
}

impl EpisodesSynchronizer {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        db: Arc<Database>,
        prefs: Arc<dyn Preferences>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            db,
            freshness: FreshnessTracker::new(prefs),
            clock,
            locks: SyncLocks::default(),
        }
    }

    /// `show_api_id` is the catalog id of the show, not its local row id.
    pub fn get_episodes(&self, show_api_id: i64) -> Result<SeasonEpisodes> {
        self.get_episodes_with(show_api_id, false)
    }

    pub fn get_episodes_with(&self, show_api_id: i64, force_refresh: bool) -> Result<SeasonEpisodes> {
        debug!(show_api_id, force_refresh, "getting episodes");
        self.locks
            .with_lock(SyncSubject::ShowEpisodes(show_api_id), || {
                self.refresh_if_needed(show_api_id, force_refresh)?;
                self.get_cached_episodes(show_api_id)
            })?
    }

    pub fn get_cached_episodes(&self, show_api_id: i64) -> Result<SeasonEpisodes> {
        let rows = self.db.episodes_for_show(show_api_id)?;
        Ok(group_by_season(rows))
    }

    pub fn get_episode(&self, id: i64) -> Result<Option<Episode>> {
        debug!(id, "getting episode");
        Ok(self.db.episode_by_id(id)?.map(episode_from_row))
    }

    /// Waits for in-flight syncs, then drops every episode and freshness record.
    pub fn clear(&self) -> Result<()> {
        self.locks.with_exclusive(|| {
            let removed = self.db.clear_episodes()?;
            self.freshness.forget_episodes()?;
            info!(removed, "episode cache cleared");
            Ok(())
        })
    }

    fn refresh_if_needed(&self, show_api_id: i64, force_refresh: bool) -> Result<()> {
        let now = self.clock.now_millis();
        let synced_at = self.freshness.episodes_synced_at(show_api_id);
        let stale = synced_at.is_none_or(|at| is_stale(at, now));
        if !force_refresh && !stale {
            debug!(show_api_id, "episodes are fresh");
            return Ok(());
        }

        let seasons = self.catalog.seasons(show_api_id)?;
        let mut rows = Vec::new();
        for season in &seasons {
            let episodes = self.catalog.season_episodes(season.id)?;
            rows.extend(
                episodes
                    .into_iter()
                    .map(|record| episode_row_from_record(record, show_api_id)),
            );
        }
        let removed = self.db.replace_episodes_for_show(show_api_id, &rows)?;
        self.freshness.stamp_episodes(show_api_id, now)?;

        info!(
            show_api_id,
            removed,
            seasons = seasons.len(),
            episodes = rows.len(),
            "episodes synchronized"
        );
        Ok(())
    }
}

fn episode_row_from_record(record: EpisodeRecord, show_api_id: i64) -> EpisodeRow {
    let (image_medium, image_original) = match record.image {
        Some(image) => (Some(image.medium), Some(image.original)),
        None => (None, None),
    };
    EpisodeRow {
        id: None,
        api_id: record.id,
        show_api_id,
        name: record.name,
        season: record.season,
        number: record.number.unwrap_or(0),
        summary: record.summary,
        image_medium,
        image_original,
        rating: record.rating.average.unwrap_or(0.0),
    }
}

fn episode_from_row(row: EpisodeRow) -> Episode {
    Episode {
        id: row.id.unwrap_or_default(),
        name: row.name,
        number: row.number,
        season: row.season,
        summary: row.summary.unwrap_or_default(),
        image: ImageData {
            medium: row.image_medium.unwrap_or_default(),
            original: row.image_original.unwrap_or_default(),
        },
        rating: row.rating,
    }
}

fn group_by_season(rows: Vec<EpisodeRow>) -> SeasonEpisodes {
    let mut grouped = SeasonEpisodes::new();
    for row in rows {
        grouped
            .entry(row.season)
            .or_default()
            .push(episode_from_row(row));
    }
    for episodes in grouped.values_mut() {
        episodes.sort_by_key(|episode| episode.number);
    }
    grouped
}
