use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::catalog::{CatalogClient, ShowRecord};
use crate::db::{Database, ShowRow};
use crate::model::{ImageData, Schedule, Show};
use crate::prefs::Preferences;

use super::{Clock, FreshnessTracker, SyncLocks, SyncSubject, is_stale};

pub struct ShowsSynchronizer {
    catalog: Arc<dyn CatalogClient>,
    db: Arc<Database>,
    freshness: FreshnessTracker,
    clock: Arc<dyn Clock>,
    locks: SyncLocks,
}

impl ShowsSynchronizer {
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

    /// Refreshes the show list from the catalog when forced or stale, then
    /// returns the stored list.
    pub fn get_shows(&self, force_refresh: bool) -> Result<Vec<Show>> {
        debug!(force_refresh, "getting shows");
        self.locks.with_lock(SyncSubject::ShowList, || {
            self.refresh_if_needed(force_refresh)?;
            self.get_cached_shows()
        })?
    }

    pub fn get_cached_shows(&self) -> Result<Vec<Show>> {
        Ok(self.db.list_shows()?.into_iter().map(show_from_row).collect())
    }

    pub fn search_shows_by_name(&self, query: &str) -> Result<Vec<Show>> {
        debug!(query, "searching shows by name");
        Ok(self
            .db
            .shows_by_name(query)?
            .into_iter()
            .map(show_from_row)
            .collect())
    }

    pub fn get_show(&self, id: i64) -> Result<Option<Show>> {
        debug!(id, "getting show");
        Ok(self.db.show_by_id(id)?.map(show_from_row))
    }

    pub fn toggle_show_favorite(&self, id: i64, is_favorite: bool) -> Result<Option<Show>> {
        debug!(id, is_favorite, "toggling show favorite");
        let Some(row) = self.db.show_by_id(id)? else {
            return Ok(None);
        };
        let updated = ShowRow { is_favorite, ..row };
        self.db.insert_shows(std::slice::from_ref(&updated))?;
        Ok(Some(show_from_row(updated)))
    }

    /// Millis of the last successful list sync, 0 when never synced.
    pub fn synced_at(&self) -> i64 {
        self.freshness.shows_synced_at()
    }

    /// Drops the show-list timestamp so the next non-forced call refetches.
    pub fn invalidate(&self) -> Result<()> {
        self.freshness.forget_shows()
    }

    fn refresh_if_needed(&self, force_refresh: bool) -> Result<()> {
        let now = self.clock.now_millis();
        let synced_at = self.freshness.shows_synced_at();
        if !force_refresh && !is_stale(synced_at, now) {
            debug!(synced_at, "show list is fresh");
            return Ok(());
        }

        let records = self.catalog.shows()?;
        let rows = records
            .into_iter()
            .map(show_row_from_record)
            .collect::<Vec<_>>();
        // Row ids do not survive the swap, so favorites are carried by catalog id.
        let removed = self.db.replace_shows(&rows)?;
        self.freshness.stamp_shows(now)?;

        info!(removed, stored = rows.len(), "show list synchronized");
        Ok(())
    }
}

fn show_row_from_record(record: ShowRecord) -> ShowRow {
    let image = record.image.unwrap_or_default();
    ShowRow {
        id: None,
        api_id: record.id,
        name: record.name,
        summary: record.summary.unwrap_or_default(),
        image_medium: image.medium,
        image_original: image.original,
        genres: record.genres,
        schedule_time: record.schedule.time,
        schedule_days: record.schedule.days,
        is_favorite: false,
        rating: record.rating.average.unwrap_or(0.0),
    }
}

fn show_from_row(row: ShowRow) -> Show {
    Show {
        local_id: row.id.unwrap_or_default(),
        api_id: row.api_id,
        name: row.name,
        summary: row.summary,
        images: ImageData {
            medium: row.image_medium,
            original: row.image_original,
        },
        genres: row.genres,
        schedule: Schedule {
            time: row.schedule_time,
            days: row.schedule_days,
        },
        is_favorite: row.is_favorite,
        rating: row.rating,
    }
}
