use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use anyhow::{Result, anyhow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncSubject {
    ShowList,
    ShowEpisodes(i64),
}

/// One mutex per subject, created on first use and dropped once no caller
/// holds or waits on it. `with_exclusive` waits for every subject.
#[derive(Default)]
pub struct SyncLocks {
    inflight: Mutex<HashMap<SyncSubject, Arc<Mutex<()>>>>,
    exclusive: RwLock<()>,
}

impl SyncLocks {
    pub fn with_lock<R>(&self, subject: SyncSubject, work: impl FnOnce() -> R) -> Result<R> {
        let _shared = self.exclusive.read().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(self.table()?.entry(subject).or_default());
        let out = {
            // The guarded value is `()`, so a panic in an earlier holder leaves nothing torn.
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            work()
        };

        let mut inflight = self.table()?;
        // One count for the table, one for `lock`.
        if Arc::strong_count(&lock) == 2 {
            inflight.remove(&subject);
        }
        Ok(out)
    }

    pub fn with_exclusive<R>(&self, work: impl FnOnce() -> R) -> R {
        let _exclusive = self.exclusive.write().unwrap_or_else(PoisonError::into_inner);
        work()
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<SyncSubject, Arc<Mutex<()>>>>> {
        self.inflight
            .lock()
            .map_err(|_| anyhow!("sync lock table poisoned"))
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inflight.lock().map(|table| table.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn same_subject_runs_one_at_a_time() {
        let locks = Arc::new(SyncLocks::default());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                std::thread::spawn(move || {
                    locks
                        .with_lock(SyncSubject::ShowEpisodes(1), || {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            active.fetch_sub(1, Ordering::SeqCst);
                        })
                        .expect("lock");
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_subjects_do_not_block_each_other() {
        let locks = SyncLocks::default();
        let nested = locks
            .with_lock(SyncSubject::ShowList, || {
                locks
                    .with_lock(SyncSubject::ShowEpisodes(9), || 9)
                    .expect("inner lock")
            })
            .expect("outer lock");
        assert_eq!(nested, 9);
    }

    #[test]
    fn released_subjects_leave_the_table() {
        let locks = SyncLocks::default();
        for show in 0..5 {
            locks
                .with_lock(SyncSubject::ShowEpisodes(show), || ())
                .expect("lock");
        }
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn exclusive_work_waits_for_inflight_subjects() {
        let locks = Arc::new(SyncLocks::default());
        let finished = Arc::new(AtomicUsize::new(0));

        let worker = {
            let locks = Arc::clone(&locks);
            let finished = Arc::clone(&finished);
            std::thread::spawn(move || {
                locks
                    .with_lock(SyncSubject::ShowEpisodes(1), || {
                        std::thread::sleep(Duration::from_millis(80));
                        finished.fetch_add(1, Ordering::SeqCst);
                    })
                    .expect("lock");
            })
        };
        std::thread::sleep(Duration::from_millis(20));

        let seen = locks.with_exclusive(|| finished.load(Ordering::SeqCst));

        worker.join().expect("join");
        assert_eq!(seen, 1);
    }
}
