//! Per-screen controllers and the state plumbing they share.
//!
//! A controller owns its observable cells and a [`Scope`]. Intents that need
//! I/O run on a worker thread launched through the scope; once the scope is
//! cancelled no cell is written anymore and pending grace-period sleeps
//! return early.

pub mod episode_detail;
pub mod home;
pub mod nav;
pub mod pin;
pub mod show_detail;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use tracing::{error, warn};

use self::nav::{NavigationEvent, Navigator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiState {
    Loading,
    Refreshing,
    Idle,
    Success(String),
    Error(String),
}

impl UiState {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Loading | Self::Refreshing)
    }
}

struct Versioned<T> {
    value: T,
    version: u64,
}

/// A value cell observers can read or wait on. Every `set` bumps the version.
pub struct Observable<T> {
    inner: Arc<(Mutex<Versioned<T>>, Condvar)>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new((Mutex::new(Versioned { value, version: 0 }), Condvar::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Versioned<T>> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    fn set(&self, value: T) {
        let mut slot = self.lock();
        slot.value = value;
        slot.version += 1;
        drop(slot);
        self.inner.1.notify_all();
    }

    /// Blocks until `pred` holds or `timeout` elapses.
    #[cfg(test)]
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&T) -> bool) -> Option<T> {
        let guard = self.lock();
        let (guard, _) = self
            .inner
            .1
            .wait_timeout_while(guard, timeout, |slot| !pred(&slot.value))
            .unwrap_or_else(PoisonError::into_inner);
        pred(&guard.value).then(|| guard.value.clone())
    }
}

/// Fan-out of transient events; late subscribers only see later events.
pub struct EventStream<T> {
    subscribers: Arc<Mutex<Vec<Sender<T>>>>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Default for EventStream<T> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> EventStream<T> {
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn emit(&self, event: T) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Lifetime of a screen's background work.
#[derive(Clone)]
pub struct Scope {
    cancelled: Arc<(Mutex<bool>, Condvar)>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn is_active(&self) -> bool {
        !*self.cancelled.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cancel(&self) {
        *self.cancelled.0.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cancelled.1.notify_all();
    }

    /// Returns `false` when cancelled before `duration` elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = self.cancelled.0.lock().unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = self
            .cancelled
            .1
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        !*cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// How long a fatal error stays visible before navigating back.
    pub error_grace: Duration,
    /// Pause between a successful unlock and entering the app.
    pub unlock_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            error_grace: Duration::from_millis(2000),
            unlock_grace: Duration::from_millis(1000),
        }
    }
}

/// State and plumbing shared by every screen controller.
#[derive(Clone)]
pub struct ScreenCore {
    name: &'static str,
    state: Observable<UiState>,
    navigator: Navigator,
    scope: Scope,
    initialized: Arc<AtomicBool>,
    timings: Timings,
}

impl ScreenCore {
    pub fn new(name: &'static str, navigator: Navigator) -> Self {
        Self {
            name,
            state: Observable::new(UiState::Idle),
            navigator,
            scope: Scope::new(),
            initialized: Arc::new(AtomicBool::new(false)),
            timings: Timings::default(),
        }
    }

    #[cfg(test)]
    pub fn set_timings(&mut self, timings: Timings) {
        self.timings = timings;
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn state(&self) -> &Observable<UiState> {
        &self.state
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// True only for the first call; later `initialize` calls are ignored.
    pub fn begin_initialize(&self) -> bool {
        !self.initialized.swap(true, Ordering::SeqCst)
    }

    pub fn set_state(&self, state: UiState) {
        self.publish(&self.state, state);
    }

    pub fn publish<T: Clone>(&self, cell: &Observable<T>, value: T) {
        if self.scope.is_active() {
            cell.set(value);
        }
    }

    pub fn emit<T: Clone>(&self, stream: &EventStream<T>, event: T) {
        if self.scope.is_active() {
            stream.emit(event);
        }
    }

    pub fn navigate(&self, event: NavigationEvent) {
        if self.scope.is_active() {
            self.navigator.navigate_to(event);
        }
    }

    /// Shows `message` as an error, waits out the grace period, then goes back.
    pub fn fail_and_leave(&self, message: String) {
        error!(screen = self.name, "{message}");
        self.set_state(UiState::Error(message));
        if self.scope.sleep(self.timings.error_grace) {
            self.navigate(NavigationEvent::Back);
        }
    }

    /// Runs `work` on a worker thread. An error lands the screen in `Error`.
    pub fn launch<F>(&self, task: &'static str, work: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let core = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("{}-{task}", self.name))
            .spawn(move || {
                if let Err(err) = work() {
                    error!(screen = core.name, task, "{err:#}");
                    core.set_state(UiState::Error(format!("{err:#}")));
                }
            });
        if let Err(err) = spawned {
            warn!(screen = self.name, task, "failed to start worker: {err}");
            self.set_state(UiState::Error(format!("failed to start {task}: {err}")));
        }
    }

    pub fn close(&self) {
        self.scope.cancel();
    }
}

/// The lifecycle every screen exposes to the frontend.
pub trait Screen {
    type Seed;

    fn core(&self) -> &ScreenCore;

    fn initialize(&self, seed: Option<Self::Seed>);

    fn state(&self) -> UiState {
        self.core().state().get()
    }

    /// Moves to `Refreshing`, re-runs the load with a forced sync, ends `Idle`.
    fn refresh(&self);

    fn on_back_pressed(&self) {
        self.core().navigate(NavigationEvent::Back);
    }

    fn on_error_dismiss(&self) {
        self.core().set_state(UiState::Idle);
    }

    fn close(&self) {
        self.core().close();
    }
}
