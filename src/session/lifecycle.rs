// Model lifecycle - authoritative per-model state machine
//
//   available -> downloading -> ready
//                            \-> error -> (reset) -> available
//
// Eviction and explicit unloads send a model back to available.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle state of a single model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ModelState {
    /// Not loaded; can be requested
    Available,
    /// Engine construction in progress
    Downloading { progress: u8 },
    /// Engine loaded and memoized
    Ready,
    /// Last construction failed
    Error { message: String },
}

impl ModelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Available => "available",
            ModelState::Downloading { .. } => "downloading",
            ModelState::Ready => "ready",
            ModelState::Error { .. } => "error",
        }
    }

    /// Human-readable status line
    pub fn status_message(&self) -> String {
        match self {
            ModelState::Available => "Available".to_string(),
            ModelState::Downloading { progress } => format!("Downloading ({}%)", progress),
            ModelState::Ready => "✓ Ready".to_string(),
            ModelState::Error { message } => format!("✗ Failed: {}", message),
        }
    }
}

/// Narrow registry-membership view of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Ready,
    NotLoaded,
}

/// Point-in-time state of a model
#[derive(Debug, Clone, Serialize)]
pub struct ModelSnapshot {
    pub model_id: String,
    pub state: ModelState,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe lifecycle table - clone freely
#[derive(Clone, Default)]
pub struct LifecycleTracker {
    entries: Arc<DashMap<String, ModelSnapshot>>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state (`Available` for models never seen)
    pub fn state(&self, model_id: &str) -> ModelState {
        self.entries
            .get(model_id)
            .map(|entry| entry.state.clone())
            .unwrap_or(ModelState::Available)
    }

    pub fn snapshot(&self, model_id: &str) -> Option<ModelSnapshot> {
        self.entries.get(model_id).map(|entry| entry.clone())
    }

    /// All tracked models, sorted by identifier
    pub fn snapshots(&self) -> Vec<ModelSnapshot> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        all
    }

    pub fn begin_download(&self, model_id: &str) {
        self.set(model_id, ModelState::Downloading { progress: 0 });
    }

    /// Update download progress; ignored unless the model is downloading
    pub fn record_progress(&self, model_id: &str, percent: u8) {
        if let Some(mut entry) = self.entries.get_mut(model_id) {
            if let ModelState::Downloading { progress } = &mut entry.state {
                *progress = percent.min(100);
                entry.updated_at = Utc::now();
            }
        }
    }

    pub fn mark_ready(&self, model_id: &str) {
        self.set(model_id, ModelState::Ready);
    }

    /// Move `Downloading -> Ready`. Returns false (and changes nothing) if the
    /// model left the downloading state meanwhile, e.g. it was unloaded.
    pub fn complete_download(&self, model_id: &str) -> bool {
        match self.entries.get_mut(model_id) {
            Some(mut entry) if matches!(entry.state, ModelState::Downloading { .. }) => {
                entry.state = ModelState::Ready;
                entry.updated_at = Utc::now();
                tracing::debug!("{} -> ready", model_id);
                true
            }
            _ => false,
        }
    }

    pub fn mark_failed(&self, model_id: &str, message: impl Into<String>) {
        self.set(
            model_id,
            ModelState::Error {
                message: message.into(),
            },
        );
    }

    pub fn mark_available(&self, model_id: &str) {
        self.set(model_id, ModelState::Available);
    }

    /// Move `Error -> Available`. Returns false if the model wasn't in error.
    pub fn reset_error(&self, model_id: &str) -> bool {
        match self.entries.get_mut(model_id) {
            Some(mut entry) if matches!(entry.state, ModelState::Error { .. }) => {
                entry.state = ModelState::Available;
                entry.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    fn set(&self, model_id: &str, state: ModelState) {
        tracing::debug!("{} -> {}", model_id, state.label());
        self.entries.insert(
            model_id.to_string(),
            ModelSnapshot {
                model_id: model_id.to_string(),
                state,
                updated_at: Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_is_available() {
        let tracker = LifecycleTracker::new();
        assert_eq!(tracker.state("m"), ModelState::Available);
        assert!(tracker.snapshot("m").is_none());
    }

    #[test]
    fn test_download_then_ready() {
        let tracker = LifecycleTracker::new();
        tracker.begin_download("m");
        tracker.record_progress("m", 40);
        assert_eq!(tracker.state("m"), ModelState::Downloading { progress: 40 });

        tracker.mark_ready("m");
        assert!(tracker.state("m").is_ready());
    }

    #[test]
    fn test_complete_download_requires_downloading() {
        let tracker = LifecycleTracker::new();
        assert!(!tracker.complete_download("m"));
        assert_eq!(tracker.state("m"), ModelState::Available);

        tracker.begin_download("m");
        tracker.mark_available("m");
        assert!(!tracker.complete_download("m"));

        tracker.begin_download("m");
        assert!(tracker.complete_download("m"));
        assert!(tracker.state("m").is_ready());
    }

    #[test]
    fn test_progress_ignored_outside_download() {
        let tracker = LifecycleTracker::new();
        tracker.mark_ready("m");
        tracker.record_progress("m", 70);
        assert_eq!(tracker.state("m"), ModelState::Ready);

        tracker.record_progress("never-seen", 10);
        assert_eq!(tracker.state("never-seen"), ModelState::Available);
    }

    #[test]
    fn test_error_reset_returns_to_available() {
        let tracker = LifecycleTracker::new();
        tracker.begin_download("m");
        tracker.mark_failed("m", "network down");
        assert_eq!(tracker.state("m").label(), "error");

        assert!(tracker.reset_error("m"));
        assert_eq!(tracker.state("m"), ModelState::Available);
        assert!(!tracker.reset_error("m"));
    }

    #[test]
    fn test_reset_does_not_touch_ready_model() {
        let tracker = LifecycleTracker::new();
        tracker.mark_ready("m");
        assert!(!tracker.reset_error("m"));
        assert!(tracker.state("m").is_ready());
    }

    #[test]
    fn test_status_messages() {
        assert!(ModelState::Downloading { progress: 65 }
            .status_message()
            .contains("65%"));
        assert!(ModelState::Error {
            message: "boom".to_string()
        }
        .status_message()
        .contains("boom"));
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(ModelState::Downloading { progress: 5 }).unwrap();
        assert_eq!(json["state"], "downloading");
        assert_eq!(json["progress"], 5);
    }

    #[test]
    fn test_snapshots_sorted() {
        let tracker = LifecycleTracker::new();
        tracker.mark_ready("b");
        tracker.mark_ready("a");
        let ids: Vec<_> = tracker.snapshots().into_iter().map(|s| s.model_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
