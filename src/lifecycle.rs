//! Loader-wide lifecycle: state machine, completion futures, disposal.
//!
//! State moves strictly forward, LOADING → READY → COMPLETE, with no
//! re-entry. READY means the primary, synchronously-visible scene structure
//! exists; COMPLETE is reached only after every registered completion
//! future has settled. Disposal at any state cancels outstanding work and
//! freezes the machine.

use crate::error::{AssetError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Loader state, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoaderState {
    Loading,
    Ready,
    Complete,
}

/// Observer invoked synchronously on each state transition.
pub type StateObserver = Arc<dyn Fn(LoaderState) + Send + Sync>;

type CompletionFuture = BoxFuture<'static, Result<()>>;

/// Lifecycle state shared by the loader, every resolver and every
/// extension instance of one load.
pub struct Lifecycle {
    state: RwLock<LoaderState>,
    disposed: AtomicBool,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
    completions: Mutex<Vec<CompletionFuture>>,
    observer: RwLock<Option<StateObserver>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            state: RwLock::new(LoaderState::Loading),
            disposed: AtomicBool::new(false),
            cancel_tx,
            cancel_rx,
            completions: Mutex::new(Vec::new()),
            observer: RwLock::new(None),
        }
    }

    pub fn state(&self) -> LoaderState {
        *self.state.read()
    }

    pub fn set_observer(&self, observer: StateObserver) {
        *self.observer.write() = Some(observer);
    }

    /// Advance to `next` if it is strictly forward and the loader is not
    /// disposed. Returns whether the transition happened.
    pub fn advance(&self, next: LoaderState) -> bool {
        if self.is_disposed() {
            return false;
        }
        {
            let mut state = self.state.write();
            if next <= *state {
                return false;
            }
            *state = next;
        }
        log::debug!("loader state -> {next:?}");
        if let Some(observer) = self.observer.read().clone() {
            observer(next);
        }
        true
    }

    /// Register a completion future that must settle before the loader
    /// reaches COMPLETE. Registration is valid at any point before
    /// COMPLETE, including after READY.
    pub fn register_completion<F>(&self, future: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.completions.lock().push(future.boxed());
    }

    /// Drain the currently registered completion futures. The loader calls
    /// this in a loop until empty, since settling one completion may
    /// register another.
    pub fn take_completions(&self) -> Vec<CompletionFuture> {
        std::mem::take(&mut *self.completions.lock())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Tear down: no further state transitions, no further assign
    /// callbacks, all guarded work settles with a cancellation error.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.completions.lock().clear();
        let _ = self.cancel_tx.send(true);
        log::debug!("loader disposed");
    }

    /// Run `future` until it settles or the loader is disposed, whichever
    /// comes first. Every suspension point of the resolution graph (byte
    /// fetch, image decode, renderer resource creation, extension hooks)
    /// funnels through this guard so disposal can never leave a pending
    /// promise hanging.
    pub async fn run_guarded<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        if self.is_disposed() {
            return Err(AssetError::Cancelled);
        }
        let mut cancel_rx = self.cancel_rx.clone();
        tokio::select! {
            result = future => result,
            _ = Self::wait_cancelled(&mut cancel_rx) => Err(AssetError::Cancelled),
        }
    }

    async fn wait_cancelled(cancel_rx: &mut watch::Receiver<bool>) {
        loop {
            if *cancel_rx.borrow() {
                return;
            }
            if cancel_rx.changed().await.is_err() {
                // Sender gone without cancelling; never resolves.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_state_moves_strictly_forward() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LoaderState::Loading);

        assert!(lifecycle.advance(LoaderState::Ready));
        assert!(!lifecycle.advance(LoaderState::Loading));
        assert!(!lifecycle.advance(LoaderState::Ready));
        assert!(lifecycle.advance(LoaderState::Complete));
        assert_eq!(lifecycle.state(), LoaderState::Complete);
    }

    #[test]
    fn test_disposed_lifecycle_freezes_state() {
        let lifecycle = Lifecycle::new();
        lifecycle.dispose();
        assert!(!lifecycle.advance(LoaderState::Ready));
        assert_eq!(lifecycle.state(), LoaderState::Loading);
    }

    #[test]
    fn test_observer_sees_transitions_in_order() {
        let lifecycle = Lifecycle::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        lifecycle.set_observer(Arc::new(move |state| seen_clone.lock().push(state)));

        lifecycle.advance(LoaderState::Ready);
        lifecycle.advance(LoaderState::Complete);
        assert_eq!(*seen.lock(), vec![LoaderState::Ready, LoaderState::Complete]);
    }

    #[tokio::test]
    async fn test_run_guarded_settles_on_dispose() {
        let lifecycle = Arc::new(Lifecycle::new());
        let guard_target = lifecycle.clone();

        let task = tokio::spawn(async move {
            guard_target
                .run_guarded(async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(0u32)
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        lifecycle.dispose();

        let result = task.await.unwrap();
        assert_eq!(result.unwrap_err(), AssetError::Cancelled);
    }

    #[tokio::test]
    async fn test_completions_drain_in_registration_loop() {
        let lifecycle = Arc::new(Lifecycle::new());
        let settled = Arc::new(AtomicUsize::new(0));

        let inner = lifecycle.clone();
        let settled_first = settled.clone();
        let settled_second = settled.clone();
        lifecycle.register_completion(async move {
            settled_first.fetch_add(1, Ordering::SeqCst);
            // A settling completion may register another one.
            inner.register_completion(async move {
                settled_second.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        loop {
            let pending = lifecycle.take_completions();
            if pending.is_empty() {
                break;
            }
            futures::future::try_join_all(pending).await.unwrap();
        }
        assert_eq!(settled.load(Ordering::SeqCst), 2);
    }
}
