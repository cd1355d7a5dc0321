//! Cache synchronization between the remote catalog and the local store.
//!
//! Every synchronizer call runs "check freshness, conditionally fetch, swap
//! the stored rows in one transaction, stamp, read back" as one sequential
//! pipeline under a per-subject lock, so two callers for the same subject
//! never interleave. A failed fetch leaves the store and its stamp untouched.

mod episodes;
mod freshness;
mod lock;
mod shows;

pub use episodes::{EpisodesSynchronizer, SeasonEpisodes};
pub use freshness::{FreshnessRecord, FreshnessTracker, UPDATE_PERIOD_MILLIS, is_stale};
pub use lock::{SyncLocks, SyncSubject};
pub use shows::ShowsSynchronizer;

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::catalog::{
        CatalogClient, CatalogError, EpisodeRecord, Rating, SeasonRecord, ShowRecord,
    };
    use crate::model::{ImageData, Schedule};

    use super::Clock;

    pub(crate) struct ManualClock(AtomicI64);

    impl ManualClock {
        pub(crate) fn at(millis: i64) -> Self {
            Self(AtomicI64::new(millis))
        }

        pub(crate) fn advance(&self, millis: i64) {
            self.0.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub(crate) shows: Mutex<Vec<ShowRecord>>,
        pub(crate) seasons: Mutex<HashMap<i64, Vec<SeasonRecord>>>,
        pub(crate) episodes: Mutex<HashMap<i64, Vec<EpisodeRecord>>>,
        pub(crate) failing_status: Mutex<Option<u16>>,
        pub(crate) latency: Option<Duration>,
        pub(crate) show_calls: AtomicUsize,
        pub(crate) season_calls: AtomicUsize,
        pub(crate) episode_calls: AtomicUsize,
    }

    impl FakeCatalog {
        pub(crate) fn with_shows(shows: Vec<ShowRecord>) -> Self {
            Self {
                shows: Mutex::new(shows),
                ..Self::default()
            }
        }

        pub(crate) fn add_season(&self, show_id: i64, season: SeasonRecord, eps: Vec<EpisodeRecord>) {
            self.episodes.lock().unwrap().insert(season.id, eps);
            self.seasons
                .lock()
                .unwrap()
                .entry(show_id)
                .or_default()
                .push(season);
        }

        pub(crate) fn fail_with(&self, status: Option<u16>) {
            *self.failing_status.lock().unwrap() = status;
        }

        pub(crate) fn calls(&self) -> (usize, usize, usize) {
            (
                self.show_calls.load(Ordering::SeqCst),
                self.season_calls.load(Ordering::SeqCst),
                self.episode_calls.load(Ordering::SeqCst),
            )
        }

        fn check(&self, url: &str) -> Result<(), CatalogError> {
            if let Some(latency) = self.latency {
                std::thread::sleep(latency);
            }
            match *self.failing_status.lock().unwrap() {
                Some(status) => Err(CatalogError::Status {
                    url: url.to_string(),
                    status,
                    detail: String::new(),
                }),
                None => Ok(()),
            }
        }
    }

    impl CatalogClient for FakeCatalog {
        fn shows(&self) -> Result<Vec<ShowRecord>, CatalogError> {
            self.show_calls.fetch_add(1, Ordering::SeqCst);
            self.check("/shows")?;
            Ok(self.shows.lock().unwrap().clone())
        }

        fn seasons(&self, show_id: i64) -> Result<Vec<SeasonRecord>, CatalogError> {
            self.season_calls.fetch_add(1, Ordering::SeqCst);
            self.check(&format!("/shows/{show_id}/seasons"))?;
            Ok(self
                .seasons
                .lock()
                .unwrap()
                .get(&show_id)
                .cloned()
                .unwrap_or_default())
        }

        fn season_episodes(&self, season_id: i64) -> Result<Vec<EpisodeRecord>, CatalogError> {
            self.episode_calls.fetch_add(1, Ordering::SeqCst);
            self.check(&format!("/shows/{season_id}/episodes"))?;
            Ok(self
                .episodes
                .lock()
                .unwrap()
                .get(&season_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    pub(crate) fn show_record(id: i64, name: &str) -> ShowRecord {
        ShowRecord {
            id,
            name: name.to_string(),
            summary: Some(format!("<p>{name}</p>")),
            image: Some(ImageData {
                medium: format!("https://img.test/medium/{id}.jpg"),
                original: format!("https://img.test/original/{id}.jpg"),
            }),
            genres: vec!["Drama".to_string()],
            schedule: Schedule {
                time: "22:00".to_string(),
                days: vec!["Monday".to_string()],
            },
            rating: Rating { average: None },
        }
    }

    pub(crate) fn season(id: i64, number: i64) -> SeasonRecord {
        SeasonRecord { id, number }
    }

    pub(crate) fn episode_record(id: i64, season: i64, number: i64) -> EpisodeRecord {
        EpisodeRecord {
            id,
            name: format!("Episode {season}x{number}"),
            season,
            number: Some(number),
            summary: None,
            image: None,
            rating: Rating { average: Some(7.5) },
        }
    }
}
