//! Prefetcher: shared route cache plus de-duplicated asynchronous preloads.
//!
//! [`Prefetcher`] is a cheaply cloneable handle around a [`RouteCache`] and a
//! [`LoaderRegistry`]. Its [`preload`](Prefetcher::preload) operation is
//! idempotent and never fails from the caller's point of view:
//!
//! - a live cache entry short-circuits the call;
//! - an in-flight load for the same route is joined instead of repeated;
//! - loader errors are logged and leave the route eligible for a later attempt.
//!
//! The cache state sits behind a [`std::sync::Mutex`] that is only held for
//! synchronous bookkeeping. Loader code never runs under it, so a loader may
//! itself read the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{Artifact, CacheStats, Origin, RouteCache};
use crate::router::{LoaderRegistry, normalize_path};

/// What a call to [`Prefetcher::preload`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// A live entry already existed; nothing was loaded.
    Cached,
    /// This call ran the loader and stored its artifact.
    Loaded,
    /// Another call was already loading the route; this one waited for it.
    Joined,
    /// The loader failed. Nothing was stored.
    Failed,
    /// No loader is registered for the route.
    Unroutable,
}

impl PreloadOutcome {
    /// `true` when the loader actually ran on behalf of this call.
    pub fn invoked_loader(self) -> bool {
        matches!(self, PreloadOutcome::Loaded | PreloadOutcome::Failed)
    }
}

enum Step<'a> {
    Done(PreloadOutcome),
    Join(watch::Receiver<()>),
    Load(InFlightGuard<'a>),
}

struct State {
    cache: RouteCache,
    // Receivers complete once the owning preload drops its sender.
    in_flight: HashMap<String, watch::Receiver<()>>,
}

struct Inner {
    state: Mutex<State>,
    registry: LoaderRegistry,
}

/// Shared handle to the route cache and its loaders.
///
/// # Examples
///
/// ```
/// use navcache::{Artifact, LoaderRegistry, PreloadOutcome, Prefetcher, RouteCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = LoaderRegistry::new()
///     .route("/auth/signin", |_req| async { Ok(Artifact::from("signin")) });
/// let prefetcher = Prefetcher::new(registry, RouteCache::new());
///
/// assert_eq!(prefetcher.preload("/auth/signin").await, PreloadOutcome::Loaded);
/// assert_eq!(prefetcher.preload("/auth/signin").await, PreloadOutcome::Cached);
/// assert!(prefetcher.read("/auth/signin").is_some());
/// # }
/// ```
#[derive(Clone)]
pub struct Prefetcher {
    inner: Arc<Inner>,
}

impl Prefetcher {
    /// Wraps `cache` and `registry` in a shareable handle.
    pub fn new(registry: LoaderRegistry, cache: RouteCache) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    cache,
                    in_flight: HashMap::new(),
                }),
                registry,
            }),
        }
    }

    /// The loaders this prefetcher dispatches to.
    pub fn registry(&self) -> &LoaderRegistry {
        &self.inner.registry
    }

    /// Loads `key` into the cache unless it is already cached or being loaded.
    ///
    /// An expired-but-present entry counts as absent: it is purged and the
    /// route is reloaded straight away.
    ///
    /// Concurrent calls for the same route share a single loader invocation;
    /// the later callers return [`PreloadOutcome::Joined`] once the first one
    /// finishes. Nothing here cancels a started load: a [`clear`](Self::clear)
    /// issued meanwhile does not stop the result from being stored.
    pub async fn preload(&self, key: &str) -> PreloadOutcome {
        let key = normalize_path(key);

        let guard = match self.begin(key) {
            Step::Done(outcome) => return outcome,
            Step::Join(mut rx) => {
                debug!(route = %key, "joining in-flight preload");
                // Err means the sender is gone, which is exactly the completion signal.
                let _ = rx.changed().await;
                return PreloadOutcome::Joined;
            }
            Step::Load(guard) => guard,
        };

        // The marker is already in place; the state lock is released.
        let Some(load) = self.inner.registry.load(key) else {
            return PreloadOutcome::Unroutable;
        };

        let outcome = match load.await {
            Ok(artifact) => {
                debug!(route = %key, len = artifact.len(), "route preloaded");
                self.state().cache.insert(key, artifact, Origin::Preloaded);
                PreloadOutcome::Loaded
            }
            Err(e) => {
                warn!(route = %key, error = %e, "route preload failed");
                PreloadOutcome::Failed
            }
        };

        drop(guard);
        outcome
    }

    // Decides, under a single lock acquisition, whether `key` needs loading and
    // claims the in-flight marker if it does. The loader is not invoked here.
    fn begin<'a>(&'a self, key: &'a str) -> Step<'a> {
        let mut state = self.state();

        if state.cache.contains(key) {
            return Step::Done(PreloadOutcome::Cached);
        }
        if state.cache.remove(key).is_some() {
            debug!(route = %key, "refreshing expired route");
        }

        if let Some(rx) = state.in_flight.get(key) {
            return Step::Join(rx.clone());
        }

        if !self.inner.registry.contains_route(key) {
            debug!(route = %key, "no loader registered; skipping preload");
            return Step::Done(PreloadOutcome::Unroutable);
        }

        let (tx, rx) = watch::channel(());
        state.in_flight.insert(key.to_owned(), rx);

        let guard = InFlightGuard {
            inner: &self.inner,
            key,
            _done: tx,
        };
        Step::Load(guard)
    }

    /// Preloads every key concurrently and returns each route's outcome.
    ///
    /// Each key runs in its own task, so a failing or slow route never holds up
    /// the others. Outcomes come back in the order the keys were given.
    pub async fn preload_batch<I, K>(&self, keys: I) -> Vec<(String, PreloadOutcome)>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let handles: Vec<(String, JoinHandle<PreloadOutcome>)> = keys
            .into_iter()
            .map(|key| {
                let key = normalize_path(key.as_ref()).to_owned();
                let handle = self.spawn_preload(&key);
                (key, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push((key, outcome)),
                Err(e) => {
                    warn!(route = %key, error = %e, "preload task did not complete");
                    outcomes.push((key, PreloadOutcome::Failed));
                }
            }
        }
        outcomes
    }

    /// Fire-and-forget preload on the current tokio runtime.
    ///
    /// Dropping the returned handle detaches the task; it still runs to
    /// completion.
    pub fn spawn_preload(&self, key: &str) -> JoinHandle<PreloadOutcome> {
        let prefetcher = self.clone();
        let key = key.to_owned();
        tokio::spawn(async move { prefetcher.preload(&key).await })
    }

    /// Stores `artifact` under `key`, overwriting any previous entry.
    pub fn store(&self, key: &str, artifact: Artifact) {
        self.state().cache.store(key, artifact);
    }

    /// Reads a live artifact, purging the entry if it has expired.
    pub fn read(&self, key: &str) -> Option<Artifact> {
        self.state().cache.read(key)
    }

    /// Returns `true` if a live entry exists for `key`. Does not purge.
    pub fn contains(&self, key: &str) -> bool {
        self.state().cache.contains(key)
    }

    /// Invalidates a single route.
    pub fn remove(&self, key: &str) -> Option<Artifact> {
        self.state().cache.remove(key)
    }

    /// Drops every cached route. In-flight preloads are left running.
    pub fn clear(&self) {
        self.state().cache.clear();
    }

    /// Removes expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        self.state().cache.sweep()
    }

    /// Number of stored routes, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.state().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().cache.is_empty()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.state().cache.stats()
    }

    /// Returns `true` while a loader for `key` is running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.state().in_flight.contains_key(normalize_path(key))
    }

    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Prefetcher")
            .field("cached", &state.cache.len())
            .field("in_flight", &state.in_flight.len())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

// Clears the in-flight marker and wakes joined callers, even if the loader
// panics or the preload future is dropped mid-await.
struct InFlightGuard<'a> {
    inner: &'a Inner,
    key: &'a str,
    _done: watch::Sender<()>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(self.key);
    }
}
