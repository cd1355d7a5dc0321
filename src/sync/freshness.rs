use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::prefs::Preferences;

/// Cached data older than this is refetched.
pub const UPDATE_PERIOD_MILLIS: i64 = 6 * 60 * 60 * 1000;

const SHOWS_SYNCED_AT_KEY: &str = "shows_update_time_key";
const EPISODES_SYNCED_AT_KEY: &str = "episodes_update_time_key";

pub fn is_stale(last_synced_at_millis: i64, now_millis: i64) -> bool {
    now_millis - last_synced_at_millis > UPDATE_PERIOD_MILLIS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    #[serde(rename = "id")]
    pub subject_id: i64,
    #[serde(rename = "timestamp")]
    pub last_synced_at_millis: i64,
}

/// Last-sync timestamps kept in the preferences blob: one scalar for the
/// show list and one serialized set with a record per show for episodes.
#[derive(Clone)]
pub struct FreshnessTracker {
    prefs: Arc<dyn Preferences>,
    // Serializes read-modify-write of the episode record set.
    episodes_guard: Arc<Mutex<()>>,
}

impl FreshnessTracker {
    pub fn new(prefs: Arc<dyn Preferences>) -> Self {
        Self {
            prefs,
            episodes_guard: Arc::default(),
        }
    }

    pub fn shows_synced_at(&self) -> i64 {
        self.prefs.get_i64(SHOWS_SYNCED_AT_KEY).unwrap_or(0)
    }

    pub fn stamp_shows(&self, now_millis: i64) -> Result<()> {
        self.prefs.put_i64(SHOWS_SYNCED_AT_KEY, now_millis)
    }

    pub fn forget_shows(&self) -> Result<()> {
        self.prefs.remove(SHOWS_SYNCED_AT_KEY)
    }

    pub fn episode_records(&self) -> Vec<FreshnessRecord> {
        let Some(raw) = self.prefs.get_string(EPISODES_SYNCED_AT_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<FreshnessRecord>>(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!("discarding unreadable episode freshness records: {err}");
                Vec::new()
            }
        }
    }

    pub fn episodes_synced_at(&self, show_api_id: i64) -> Option<i64> {
        self.episode_records()
            .into_iter()
            .find(|record| record.subject_id == show_api_id)
            .map(|record| record.last_synced_at_millis)
    }

    /// Replaces any previous record for the show.
    pub fn stamp_episodes(&self, show_api_id: i64, now_millis: i64) -> Result<()> {
        let _guard = self.episodes_guard();
        let mut records = self.episode_records();
        records.retain(|record| record.subject_id != show_api_id);
        records.push(FreshnessRecord {
            subject_id: show_api_id,
            last_synced_at_millis: now_millis,
        });
        records.sort_by_key(|record| record.subject_id);
        self.prefs
            .put_string(EPISODES_SYNCED_AT_KEY, &serde_json::to_string(&records)?)
    }

    pub fn forget_episodes(&self) -> Result<()> {
        let _guard = self.episodes_guard();
        self.prefs.remove(EPISODES_SYNCED_AT_KEY)
    }

    fn episodes_guard(&self) -> MutexGuard<'_, ()> {
        self.episodes_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::JsonPreferences;

    fn tracker() -> FreshnessTracker {
        FreshnessTracker::new(Arc::new(JsonPreferences::in_memory()))
    }

    #[test]
    fn staleness_boundary_is_exclusive() {
        assert!(!is_stale(0, UPDATE_PERIOD_MILLIS));
        assert!(is_stale(0, UPDATE_PERIOD_MILLIS + 1));
    }

    #[test]
    fn show_list_defaults_to_never_synced() {
        let tracker = tracker();
        assert_eq!(tracker.shows_synced_at(), 0);
        tracker.stamp_shows(1_000).expect("stamp");
        assert_eq!(tracker.shows_synced_at(), 1_000);
        tracker.forget_shows().expect("forget");
        assert_eq!(tracker.shows_synced_at(), 0);
    }

    #[test]
    fn restamping_a_show_keeps_a_single_record() {
        let tracker = tracker();
        tracker.stamp_episodes(7, 100).expect("stamp");
        tracker.stamp_episodes(3, 150).expect("stamp");
        tracker.stamp_episodes(7, 200).expect("stamp");

        assert_eq!(
            tracker.episode_records(),
            vec![
                FreshnessRecord {
                    subject_id: 3,
                    last_synced_at_millis: 150
                },
                FreshnessRecord {
                    subject_id: 7,
                    last_synced_at_millis: 200
                },
            ]
        );
        assert_eq!(tracker.episodes_synced_at(7), Some(200));
        assert_eq!(tracker.episodes_synced_at(8), None);

        tracker.forget_episodes().expect("forget");
        assert!(tracker.episode_records().is_empty());
    }

    #[test]
    fn concurrent_stamps_for_different_shows_all_land() {
        let tracker = tracker();

        let handles = (0..8)
            .map(|show| {
                let tracker = tracker.clone();
                std::thread::spawn(move || tracker.stamp_episodes(show, 500).expect("stamp"))
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(
            tracker
                .episode_records()
                .iter()
                .map(|record| record.subject_id)
                .collect::<Vec<_>>(),
            (0..8).collect::<Vec<_>>()
        );
    }
}
