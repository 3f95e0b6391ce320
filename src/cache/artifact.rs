//! ArtifactCache: store lookups plus at-most-one render per key.
//!
//! Per key the cache moves `Absent -> Pending -> Ready`:
//!
//! ```text
//!            lookup miss                render ok + save
//!  Absent ─────────────────► Pending ─────────────────────► Ready
//!    ▲                          │
//!    └──────────────────────────┘
//!          render error (broadcast to every waiter, nothing stored)
//! ```
//!
//! Pending keys live in the `in_flight` map. The first caller for a key is
//! the leader and runs the render; later callers wait on the leader's
//! `Notify` and receive a clone of its result. Clearing the store never
//! touches `in_flight`, so a pending render still completes into Ready.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{ViewerError, ViewerResult};
use crate::render::RenderedPage;

use super::key::{CacheEntry, RenderKey};
use super::store::ArtifactStore;

type SharedResult = ViewerResult<Vec<Arc<RenderedPage>>>;

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Served from the artifact store
    Hit,
    /// Joined a render already in flight
    Joined,
    /// This call ran the render
    Rendered,
}

/// Pages returned by [`ArtifactCache::get_or_render`].
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub pages: Vec<Arc<RenderedPage>>,
    pub outcome: LookupOutcome,
}

impl CacheLookup {
    /// True when this call did no render work.
    pub fn cache_hit(&self) -> bool {
        self.outcome != LookupOutcome::Rendered
    }
}

/// Pages produced by a render closure.
#[derive(Debug)]
pub struct RenderOutput {
    pub pages: Vec<RenderedPage>,
    /// Whether the pages may be stored under the render key
    pub cacheable: bool,
}

impl RenderOutput {
    /// Pages that are returned to callers but never stored.
    pub fn uncached(pages: Vec<RenderedPage>) -> Self {
        Self {
            pages,
            cacheable: false,
        }
    }
}

impl From<Vec<RenderedPage>> for RenderOutput {
    fn from(pages: Vec<RenderedPage>) -> Self {
        Self {
            pages,
            cacheable: true,
        }
    }
}

/// State shared between a leader and its waiters.
struct InFlightState {
    notify: Notify,
    result: Mutex<Option<SharedResult>>,
}

/// Publishes the leader's result; reports `Cancelled` if the leader's
/// future is dropped before finishing.
struct LeaderGuard<'a> {
    cache: &'a ArtifactCache,
    key: &'a RenderKey,
    state: Arc<InFlightState>,
    done: bool,
}

impl LeaderGuard<'_> {
    fn finish(mut self, result: SharedResult) {
        self.publish(result);
        self.done = true;
    }

    fn publish(&self, result: SharedResult) {
        *self.state.result.lock() = Some(result);
        self.cache.in_flight.lock().remove(self.key);
        self.state.notify.notify_waiters();
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.publish(Err(ViewerError::Cancelled));
        }
    }
}

/// Cache of rendered page sets in front of an optional [`ArtifactStore`].
///
/// Without a store (caching disabled) every lookup renders, nothing is
/// persisted, and concurrent identical requests still share one render.
pub struct ArtifactCache {
    store: Option<Arc<dyn ArtifactStore>>,
    in_flight: Mutex<HashMap<RenderKey, Arc<InFlightState>>>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store: Some(store),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            store: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Number of keys currently being rendered.
    pub fn pending(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Ready pages for `key`, if stored. Store failures count as a miss.
    pub async fn lookup(&self, key: &RenderKey) -> Option<Vec<Arc<RenderedPage>>> {
        let store = self.store.as_ref()?;
        match store.load(key).await {
            Ok(Some(entries)) => Some(entries.into_iter().map(|e| e.page).collect()),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, store = store.name(), error = %e, "Cache read failed, rendering instead");
                None
            }
        }
    }

    /// Return the pages for `key`, running `render` only if no stored or
    /// in-flight result exists.
    ///
    /// Output marked not cacheable still reaches every waiter but is not
    /// saved to the store.
    pub async fn get_or_render<F, Fut, O>(&self, key: &RenderKey, render: F) -> ViewerResult<CacheLookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ViewerResult<O>>,
        O: Into<RenderOutput>,
    {
        // Fast path: ready in the store
        if let Some(pages) = self.lookup(key).await {
            debug!(key = %key, "Cache hit");
            return Ok(CacheLookup {
                pages,
                outcome: LookupOutcome::Hit,
            });
        }

        // Slow path: join an in-flight render or become its leader
        let (state, leader) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(state) => (state.clone(), false),
                None => {
                    let state = Arc::new(InFlightState {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(key.clone(), state.clone());
                    (state, true)
                }
            }
        };

        if !leader {
            debug!(key = %key, "Joining in-flight render");
            let pages = wait_for(&state).await?;
            return Ok(CacheLookup {
                pages,
                outcome: LookupOutcome::Joined,
            });
        }

        let guard = LeaderGuard {
            cache: self,
            key,
            state,
            done: false,
        };

        // A previous leader may have finished between our lookup and
        // taking the lead
        if let Some(pages) = self.lookup(key).await {
            guard.finish(Ok(pages.clone()));
            return Ok(CacheLookup {
                pages,
                outcome: LookupOutcome::Hit,
            });
        }

        let (result, cacheable): (SharedResult, bool) = match render().await {
            Ok(output) => {
                let output = output.into();
                (
                    Ok(output.pages.into_iter().map(Arc::new).collect()),
                    output.cacheable,
                )
            }
            Err(e) => (Err(e), false),
        };

        if !cacheable && result.is_ok() {
            debug!(key = %key, "Render not cacheable, skipping store");
        }
        if let (Ok(pages), Some(store), true) = (&result, &self.store, cacheable) {
            let entries: Vec<CacheEntry> = pages.iter().cloned().map(CacheEntry::new).collect();
            match store.save(key, &entries).await {
                Ok(()) => debug!(key = %key, store = store.name(), pages = entries.len(), "Stored render"),
                Err(e) => warn!(key = %key, store = store.name(), error = %e, "Cache write failed"),
            }
        }

        guard.finish(result.clone());
        result.map(|pages| CacheLookup {
            pages,
            outcome: LookupOutcome::Rendered,
        })
    }

    /// Evict Ready entries for document `id`, or all when `None`.
    ///
    /// Pending renders are not affected.
    pub async fn clear(&self, document: Option<&str>) -> ViewerResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let removed = store.clear(document).await?;
        info!(
            document = document.unwrap_or("*"),
            store = store.name(),
            removed,
            "Cleared cached renders"
        );
        Ok(removed)
    }
}

async fn wait_for(state: &InFlightState) -> SharedResult {
    loop {
        let notified = state.notify.notified();
        tokio::pin!(notified);
        // Register before checking so a notify between check and await is
        // not lost
        notified.as_mut().enable();

        if let Some(result) = state.result.lock().clone() {
            return result;
        }
        notified.await;
    }
}
