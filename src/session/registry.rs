// Session Registry - memoized engine handles keyed by model identifier
//
// Each identifier maps to either a ready handle or a construction that is
// still in flight. Concurrent first requests join the in-flight construction
// (single flight), so a loader runs at most once per identifier until it
// fails or the handle is evicted. An optional resident limit evicts the
// least-recently-used ready handle.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::Modality;
use crate::errors::SessionError;

type PendingLoad<H> = Shared<BoxFuture<'static, Result<Arc<H>, SessionError>>>;

/// Called with the identifier of every handle dropped by the LRU limit
pub type EvictionHook = Arc<dyn Fn(&str) + Send + Sync>;

enum Slot<H: ?Sized> {
    Ready { handle: Arc<H>, last_used: u64 },
    Loading { generation: u64, pending: PendingLoad<H> },
}

struct RegistryState<H: ?Sized> {
    slots: HashMap<String, Slot<H>>,
    /// Logical clock for LRU ordering and load generations
    clock: u64,
}

impl<H: ?Sized> RegistryState<H> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn ready_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    /// Evict least-recently-used ready handles (never `keep`) until within `limit`
    fn evict_over(&mut self, limit: Option<usize>, keep: &str) -> Vec<String> {
        let Some(limit) = limit else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        while self.ready_count() > limit {
            let victim = self
                .slots
                .iter()
                .filter_map(|(id, slot)| match slot {
                    Slot::Ready { last_used, .. } if id != keep => Some((id, *last_used)),
                    _ => None,
                })
                .min_by_key(|(_, last_used)| *last_used)
                .map(|(id, _)| id.clone());

            match victim {
                Some(id) => {
                    self.slots.remove(&id);
                    evicted.push(id);
                }
                None => break,
            }
        }
        evicted
    }
}

fn lock<H: ?Sized>(state: &Mutex<RegistryState<H>>) -> MutexGuard<'_, RegistryState<H>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of engine handles for one modality
pub struct SessionRegistry<H: ?Sized> {
    modality: Modality,
    max_resident: Option<usize>,
    on_evict: Option<EvictionHook>,
    state: Arc<Mutex<RegistryState<H>>>,
}

impl<H: ?Sized + Send + Sync + 'static> SessionRegistry<H> {
    pub fn new(modality: Modality) -> Self {
        Self {
            modality,
            max_resident: None,
            on_evict: None,
            state: Arc::new(Mutex::new(RegistryState {
                slots: HashMap::new(),
                clock: 0,
            })),
        }
    }

    /// Cap the number of ready handles (`None` = unbounded)
    pub fn with_max_resident(mut self, max_resident: Option<usize>) -> Self {
        self.max_resident = max_resident;
        self
    }

    pub fn with_eviction_hook(mut self, hook: EvictionHook) -> Self {
        self.on_evict = Some(hook);
        self
    }

    /// Return the handle for `model_id`, constructing it with `init` if needed.
    ///
    /// `init` is only called when there is neither a ready handle nor a
    /// construction in flight. The handle is stored before any caller sees
    /// it; a failed construction is dropped so the next call starts over.
    pub async fn get_or_create<F, Fut>(&self, model_id: &str, init: F) -> Result<Arc<H>, SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<H>, SessionError>> + Send + 'static,
    {
        let pending = {
            let mut state = lock(&self.state);
            let now = state.tick();

            match state.slots.get_mut(model_id) {
                Some(Slot::Ready { handle, last_used }) => {
                    *last_used = now;
                    return Ok(Arc::clone(handle));
                }
                Some(Slot::Loading { pending, .. }) => {
                    tracing::debug!(
                        "Joining in-flight {} construction for {}",
                        self.modality,
                        model_id
                    );
                    pending.clone()
                }
                None => {
                    let pending = self.track_load(model_id, now, init());
                    state.slots.insert(
                        model_id.to_string(),
                        Slot::Loading {
                            generation: now,
                            pending: pending.clone(),
                        },
                    );
                    pending
                }
            }
        };

        pending.await
    }

    /// Wrap a construction so its outcome is written back into the registry
    fn track_load<Fut>(&self, model_id: &str, generation: u64, load: Fut) -> PendingLoad<H>
    where
        Fut: Future<Output = Result<Arc<H>, SessionError>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let model_id = model_id.to_string();
        let max_resident = self.max_resident;
        let on_evict = self.on_evict.clone();
        let modality = self.modality;

        async move {
            let result = load.await;

            let evicted = {
                let mut state = lock(&state);
                // The slot may have been removed (unload) while we were loading
                let still_ours = matches!(
                    state.slots.get(&model_id),
                    Some(Slot::Loading { generation: g, .. }) if *g == generation
                );

                match &result {
                    Ok(handle) if still_ours => {
                        let now = state.tick();
                        state.slots.insert(
                            model_id.clone(),
                            Slot::Ready {
                                handle: Arc::clone(handle),
                                last_used: now,
                            },
                        );
                        state.evict_over(max_resident, &model_id)
                    }
                    Err(_) if still_ours => {
                        state.slots.remove(&model_id);
                        Vec::new()
                    }
                    _ => Vec::new(),
                }
            };

            for id in &evicted {
                tracing::info!("Evicted {} session {} (resident limit reached)", modality, id);
                if let Some(hook) = &on_evict {
                    hook(id);
                }
            }

            result
        }
        .boxed()
        .shared()
    }

    /// True if a ready handle exists (in-flight constructions don't count)
    pub fn contains(&self, model_id: &str) -> bool {
        matches!(lock(&self.state).slots.get(model_id), Some(Slot::Ready { .. }))
    }

    pub fn is_loading(&self, model_id: &str) -> bool {
        matches!(lock(&self.state).slots.get(model_id), Some(Slot::Loading { .. }))
    }

    /// Drop the entry for `model_id`, ready or still loading. Returns true if
    /// anything was removed.
    ///
    /// An in-flight construction keeps running for the callers already
    /// awaiting it, but its result is no longer stored.
    pub fn remove(&self, model_id: &str) -> bool {
        lock(&self.state).slots.remove(model_id).is_some()
    }

    /// Number of ready handles
    pub fn len(&self) -> usize {
        lock(&self.state).ready_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers with a ready handle, sorted
    pub fn resident_ids(&self) -> Vec<String> {
        let state = lock(&self.state);
        let mut ids: Vec<String> = state
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready { .. }))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
