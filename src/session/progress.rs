// Progress Channel - per-model download callbacks
//
// One subscriber per model identifier; registering again replaces the
// previous callback. Notifying a model nobody listens to is a no-op.

use dashmap::DashMap;
use std::sync::Arc;

use crate::engine::ProgressHook;

/// Caller-owned progress callback (receives 0-100)
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Shared registry of progress callbacks - clone freely (it's an Arc inside)
#[derive(Clone, Default)]
pub struct ProgressChannel {
    callbacks: Arc<DashMap<String, ProgressCallback>>,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `model_id`, replacing any existing one
    pub fn set_callback<F>(&self, model_id: &str, callback: F)
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let previous = self
            .callbacks
            .insert(model_id.to_string(), Arc::new(callback));
        if previous.is_some() {
            tracing::debug!("Replaced progress callback for {}", model_id);
        }
    }

    /// Drop the callback for `model_id` (idempotent)
    pub fn remove_callback(&self, model_id: &str) {
        self.callbacks.remove(model_id);
    }

    pub fn has_callback(&self, model_id: &str) -> bool {
        self.callbacks.contains_key(model_id)
    }

    /// Forward a percentage to the registered callback, if any
    pub fn notify(&self, model_id: &str, percent: u8) {
        // Clone out of the map so the callback runs without holding the shard lock
        let callback = self
            .callbacks
            .get(model_id)
            .map(|entry| Arc::clone(entry.value()));

        if let Some(callback) = callback {
            callback(percent.min(100));
        }
    }

    /// Hook that forwards loader progress for `model_id` into this channel
    pub fn hook(&self, model_id: &str) -> ProgressHook {
        let channel = self.clone();
        let model_id = model_id.to_string();
        Arc::new(move |percent| channel.notify(&model_id, percent))
    }
}
