use std::sync::{Arc, Mutex};
use std::time::Duration;

use keywarden_core::ErrorStore;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::surface::{Action, Effect, Surface, SurfaceView};

/// Polls the error store on a fixed interval and publishes surface state
pub struct ErrorPoller {
    store: Arc<dyn ErrorStore>,
    interval: Duration,
    wake: Option<Arc<Notify>>,
}

impl ErrorPoller {
    pub fn new(store: Arc<dyn ErrorStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            wake: None,
        }
    }

    /// Also refresh whenever `wake` fires, see [`crate::NotifyingStore`]
    #[must_use]
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Start polling; the first read happens immediately
    pub fn spawn(self) -> PollerHandle {
        let (tx, rx) = watch::channel(SurfaceView::default());
        let shared = Arc::new(Shared {
            store: self.store,
            surface: Mutex::new(Surface::new()),
            tx,
        });

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&shared),
            self.interval,
            self.wake,
            shutdown.clone(),
        ));

        PollerHandle {
            shared,
            rx,
            shutdown,
            task: Some(task),
        }
    }
}

struct Shared {
    store: Arc<dyn ErrorStore>,
    surface: Mutex<Surface>,
    tx: watch::Sender<SurfaceView>,
}

impl Shared {
    fn apply(&self, action: Action) -> Effect {
        let mut surface = self.surface.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let effect = surface.apply(action);
        self.tx.send_replace(surface.view().clone());
        effect
    }

    fn refresh(&self) -> Effect {
        let errors = self.store.list();
        let count = errors.len();
        let effect = self.apply(Action::Snapshot(errors));

        if effect == Effect::Reveal {
            tracing::info!(count, "new errors, revealing notifications");
        }

        effect
    }
}

async fn poll_loop(shared: Arc<Shared>, interval: Duration, wake: Option<Arc<Notify>>, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
            () = woken(wake.as_deref()) => {}
        }

        // Store reads may hit the filesystem
        let refresh = Arc::clone(&shared);
        if let Err(e) = tokio::task::spawn_blocking(move || refresh.refresh()).await {
            tracing::warn!(error = %e, "error store refresh failed");
        }
    }

    tracing::debug!("error poller stopped");
}

async fn woken(wake: Option<&Notify>) {
    match wake {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

/// Handle to a running poller
///
/// Dropping the handle stops the poll loop.
pub struct PollerHandle {
    shared: Arc<Shared>,
    rx: watch::Receiver<SurfaceView>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Receiver for every published view
    pub fn subscribe(&self) -> watch::Receiver<SurfaceView> {
        self.rx.clone()
    }

    /// Latest published view
    pub fn current(&self) -> SurfaceView {
        self.rx.borrow().clone()
    }

    /// Read the store now instead of waiting for the next tick
    ///
    /// Runs on the calling thread, as do the dismiss methods.
    pub fn refresh(&self) -> Effect {
        self.shared.refresh()
    }

    pub fn open_panel(&self) {
        self.shared.apply(Action::OpenPanel);
    }

    pub fn close_panel(&self) {
        self.shared.apply(Action::ClosePanel);
    }

    /// Dismiss one error and publish the result immediately
    pub fn dismiss(&self, id: &str) {
        self.shared.store.dismiss(id);
        self.shared.refresh();
    }

    /// Dismiss every error and publish the result immediately
    pub fn dismiss_all(&self) {
        self.shared.store.dismiss_all();
        self.shared.refresh();
    }

    /// Stop polling and wait for the loop to exit
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "error poller task failed");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use keywarden_core::{ErrorInput, ManualClock, MemoryErrorStore, StoreLimits};
    use tokio::time::Instant;

    use super::*;
    use crate::NotifyingStore;

    fn memory_store() -> Arc<MemoryErrorStore> {
        memory_store_with(StoreLimits::default())
    }

    fn memory_store_with(limits: StoreLimits) -> Arc<MemoryErrorStore> {
        Arc::new(MemoryErrorStore::new(
            Arc::new(ManualClock::new(1_700_000_000_000)),
            limits,
        ))
    }

    async fn wait_for(rx: &mut watch::Receiver<SurfaceView>, predicate: impl Fn(&SurfaceView) -> bool) -> SurfaceView {
        loop {
            {
                let view = rx.borrow_and_update();
                if predicate(&view) {
                    return view.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reads_on_start_and_every_interval() {
        let store = memory_store();
        store.record(ErrorInput::error("before start"));

        let started = Instant::now();
        let handle = ErrorPoller::new(store.clone(), Duration::from_secs(1)).spawn();
        let mut rx = handle.subscribe();

        let view = wait_for(&mut rx, |view| view.revision >= 1).await;
        assert_eq!(view.count(), 1);
        assert!(view.panel_open);
        assert_eq!(view.effect, Effect::Reveal);

        store.record(ErrorInput::error("later"));
        assert_eq!(handle.current().count(), 1);

        wait_for(&mut rx, |view| view.count() == 2).await;
        assert!(started.elapsed() >= Duration::from_secs(1));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn closed_panel_reopens_only_on_new_errors() {
        let store = memory_store();
        let first = store.record(ErrorInput::error("one"));

        let handle = ErrorPoller::new(store.clone(), Duration::from_secs(1)).spawn();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |view| view.revision >= 1).await;

        handle.close_panel();
        let closed_at = handle.current().revision;
        assert!(!handle.current().panel_open);

        let view = wait_for(&mut rx, |view| view.revision > closed_at).await;
        assert_eq!(view.effect, Effect::None);
        assert!(!view.panel_open);

        handle.dismiss(&first.id);
        assert_eq!(handle.current().count(), 0);
        assert!(!handle.current().panel_open);

        store.record(ErrorInput::warning("two"));
        assert_eq!(handle.refresh(), Effect::Reveal);
        assert!(handle.current().panel_open);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_reveals_on_eviction() {
        let store = memory_store_with(StoreLimits {
            max_entries: 2,
            ..StoreLimits::default()
        });
        store.record(ErrorInput::error("one"));
        store.record(ErrorInput::error("two"));

        let handle = ErrorPoller::new(store.clone(), Duration::from_secs(1)).spawn();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |view| view.count() == 2).await;
        handle.close_panel();

        store.record(ErrorInput::error("three"));
        let view = wait_for(&mut rx, |view| view.errors.iter().any(|e| e.message == "three")).await;

        assert_eq!(view.count(), 2);
        assert_eq!(view.effect, Effect::Reveal);
        assert!(view.panel_open);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn notifying_store_wakes_before_the_tick() {
        let store = Arc::new(NotifyingStore::new(memory_store()));
        let started = Instant::now();
        let handle = ErrorPoller::new(store.clone(), Duration::from_secs(3600))
            .with_wake(store.changed())
            .spawn();
        let mut rx = handle.subscribe();
        let view = wait_for(&mut rx, |view| view.revision >= 1).await;
        assert_eq!(view.count(), 0);

        store.record(ErrorInput::error("pushed"));
        let view = wait_for(&mut rx, |view| view.count() == 1).await;

        assert!(view.panel_open);
        assert!(started.elapsed() < Duration::from_secs(3600));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_the_loop() {
        let store = memory_store();
        let handle = ErrorPoller::new(store, Duration::from_secs(1)).spawn();
        let mut rx = handle.subscribe();
        wait_for(&mut rx, |view| view.revision >= 1).await;

        drop(handle);

        // Sender goes away with the loop, so the receiver sees it closed
        while rx.changed().await.is_ok() {}
    }
}
