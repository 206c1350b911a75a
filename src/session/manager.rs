// Model Session Manager - the single entry point for generation
//
// Owns one registry per modality, the progress channel, the lifecycle table,
// the capability probe and the metrics. Every request goes through
// get-or-create, so an engine is loaded on first use and reused afterwards.

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use super::lifecycle::{LifecycleTracker, ModelSnapshot, ModelState, SessionStatus};
use super::progress::ProgressChannel;
use super::registry::{EvictionHook, SessionRegistry};
use crate::config::{Config, GenerationPolicy};
use crate::encoding::encode_data_url;
use crate::engine::{
    ChatMessage, ImageEngine, ImageEngineLoader, Modality, ProgressHook, TextEngine,
    TextEngineLoader,
};
use crate::errors::{SessionError, EMPTY_COMPLETION_FALLBACK};
use crate::hardware::CapabilityProbe;
use crate::metrics::{GenerationOutcome, SessionMetrics};

/// Builder for [`ModelSessionManager`]
pub struct ManagerBuilder {
    text_loader: Arc<dyn TextEngineLoader>,
    image_loader: Arc<dyn ImageEngineLoader>,
    policy: GenerationPolicy,
    max_resident: Option<usize>,
    probe: Option<CapabilityProbe>,
    metrics: Option<Arc<SessionMetrics>>,
}

impl ManagerBuilder {
    pub fn policy(mut self, policy: GenerationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep at most `limit` ready engines per modality (LRU eviction)
    pub fn max_resident(mut self, limit: Option<usize>) -> Self {
        self.max_resident = limit;
        self
    }

    /// Take generation policy and session limits from a loaded config
    pub fn config(self, config: &Config) -> Self {
        self.policy(config.generation.clone())
            .max_resident(config.sessions.max_resident)
    }

    pub fn probe(mut self, probe: CapabilityProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn metrics(mut self, metrics: Arc<SessionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<ModelSessionManager> {
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(SessionMetrics::new()?),
        };
        let lifecycle = LifecycleTracker::new();

        let on_evict: EvictionHook = {
            let lifecycle = lifecycle.clone();
            Arc::new(move |model_id: &str| lifecycle.mark_available(model_id))
        };

        Ok(ModelSessionManager {
            policy: self.policy,
            text_loader: self.text_loader,
            image_loader: self.image_loader,
            text_sessions: SessionRegistry::new(Modality::Text)
                .with_max_resident(self.max_resident)
                .with_eviction_hook(Arc::clone(&on_evict)),
            image_sessions: SessionRegistry::new(Modality::Image)
                .with_max_resident(self.max_resident)
                .with_eviction_hook(on_evict),
            progress: ProgressChannel::new(),
            lifecycle,
            probe: self.probe.unwrap_or_default(),
            metrics,
        })
    }
}

pub struct ModelSessionManager {
    policy: GenerationPolicy,
    text_loader: Arc<dyn TextEngineLoader>,
    image_loader: Arc<dyn ImageEngineLoader>,
    text_sessions: SessionRegistry<dyn TextEngine>,
    image_sessions: SessionRegistry<dyn ImageEngine>,
    progress: ProgressChannel,
    lifecycle: LifecycleTracker,
    probe: CapabilityProbe,
    metrics: Arc<SessionMetrics>,
}

impl ModelSessionManager {
    pub fn builder(
        text_loader: Arc<dyn TextEngineLoader>,
        image_loader: Arc<dyn ImageEngineLoader>,
    ) -> ManagerBuilder {
        ManagerBuilder {
            text_loader,
            image_loader,
            policy: GenerationPolicy::default(),
            max_resident: None,
            probe: None,
            metrics: None,
        }
    }

    /// Generate a reply to `prompt`. Never fails: problems come back as
    /// `"Error: ..."` and an empty completion as [`EMPTY_COMPLETION_FALLBACK`].
    pub async fn generate_text(&self, model_id: &str, prompt: &str) -> String {
        match self.try_generate_text(model_id, prompt).await {
            Ok(reply) => reply,
            Err(e) => format!("Error: {}", e),
        }
    }

    /// Like [`generate_text`](Self::generate_text) but with the typed error
    pub async fn try_generate_text(&self, model_id: &str, prompt: &str) -> Result<String, SessionError> {
        let engine = match self.text_session(model_id).await {
            Ok(engine) => engine,
            Err(e) => {
                // Load failures are logged where the construction ran
                self.metrics
                    .record_generation(Modality::Text, GenerationOutcome::Error);
                return Err(e);
            }
        };

        tracing::debug!("Generating text with {} via {}", model_id, engine.name());
        let messages = [ChatMessage::user(prompt)];
        match engine.complete(&messages, &self.policy.text).await {
            Ok(completion) => match completion.into_first_content() {
                Some(reply) => {
                    self.metrics
                        .record_generation(Modality::Text, GenerationOutcome::Success);
                    Ok(reply)
                }
                None => {
                    tracing::warn!("{} returned no completion content", model_id);
                    self.metrics
                        .record_generation(Modality::Text, GenerationOutcome::Empty);
                    Ok(EMPTY_COMPLETION_FALLBACK.to_string())
                }
            },
            Err(e) => {
                let err = SessionError::inference(model_id, Modality::Text, &e);
                tracing::error!("Text generation with {} failed: {}", model_id, err);
                self.metrics
                    .record_generation(Modality::Text, GenerationOutcome::Error);
                Err(err)
            }
        }
    }

    /// Generate an image and return it as a `data:image/png;base64,...` URL
    pub async fn generate_image(&self, model_id: &str, prompt: &str) -> Result<String, SessionError> {
        let result = self.render_image(model_id, prompt).await;

        let outcome = match &result {
            Ok(_) => GenerationOutcome::Success,
            Err(SessionError::EmptyImage { .. }) => GenerationOutcome::Empty,
            Err(_) => GenerationOutcome::Error,
        };
        match &result {
            Err(SessionError::Initialization { .. }) | Ok(_) => {}
            Err(e) => tracing::error!("Image generation with {} failed: {}", model_id, e),
        }
        self.metrics.record_generation(Modality::Image, outcome);

        result
    }

    async fn render_image(&self, model_id: &str, prompt: &str) -> Result<String, SessionError> {
        let engine = self.image_session(model_id).await?;
        tracing::debug!("Generating image with {} via {}", model_id, engine.name());

        let output = engine
            .generate(prompt, &self.policy.image)
            .await
            .map_err(|e| SessionError::inference(model_id, Modality::Image, &e))?;

        let image = output
            .images
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::EmptyImage {
                model_id: model_id.to_string(),
            })?;

        encode_data_url(&image).map_err(|e| SessionError::encoding(model_id, &e))
    }

    /// Receive download percentages for `model_id` (replaces any previous callback)
    pub fn set_download_callback<F>(&self, model_id: &str, callback: F)
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.progress.set_callback(model_id, callback);
    }

    pub fn remove_download_callback(&self, model_id: &str) {
        self.progress.remove_callback(model_id);
    }

    /// `Ready` if either modality holds a loaded engine for `model_id`
    pub fn get_status(&self, model_id: &str) -> SessionStatus {
        if self.text_sessions.contains(model_id) || self.image_sessions.contains(model_id) {
            SessionStatus::Ready
        } else {
            SessionStatus::NotLoaded
        }
    }

    /// Lifecycle state for `model_id`. State is tracked per identifier, not
    /// per modality, so a text and an image model must not share an id.
    pub fn model_state(&self, model_id: &str) -> ModelState {
        self.lifecycle.state(model_id)
    }

    pub fn model_snapshots(&self) -> Vec<ModelSnapshot> {
        self.lifecycle.snapshots()
    }

    /// Clear a failed load so the model shows as available again
    pub fn reset_error(&self, model_id: &str) -> bool {
        self.lifecycle.reset_error(model_id)
    }

    /// Drop the engines for `model_id`, loaded or still loading. Returns true
    /// if anything was dropped. An interrupted load finishes for its waiting
    /// callers but is not kept.
    pub fn unload(&self, model_id: &str) -> bool {
        let text = self.text_sessions.remove(model_id);
        let image = self.image_sessions.remove(model_id);
        let removed = text || image;

        if removed {
            tracing::info!("Unloaded {}", model_id);
            self.lifecycle.mark_available(model_id);
        }
        self.refresh_resident_gauges();

        removed
    }

    /// True if an accelerated adapter is available (probed once, then cached)
    pub async fn check_accelerated_support(&self) -> bool {
        self.probe.check().await
    }

    pub fn capability_probe(&self) -> &CapabilityProbe {
        &self.probe
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    /// Identifiers with a loaded engine for `modality`, sorted
    pub fn resident_models(&self, modality: Modality) -> Vec<String> {
        match modality {
            Modality::Text => self.text_sessions.resident_ids(),
            Modality::Image => self.image_sessions.resident_ids(),
        }
    }

    async fn text_session(&self, model_id: &str) -> Result<Arc<dyn TextEngine>, SessionError> {
        let result = self
            .text_sessions
            .get_or_create(model_id, || {
                let loader = Arc::clone(&self.text_loader);
                let id = model_id.to_string();
                let hook = self.begin_construction(model_id);
                self.observe_construction(model_id, Modality::Text, async move {
                    loader.load(&id, hook).await
                })
            })
            .await;

        self.metrics
            .set_resident(Modality::Text, self.text_sessions.len());
        result
    }

    async fn image_session(&self, model_id: &str) -> Result<Arc<dyn ImageEngine>, SessionError> {
        let result = self
            .image_sessions
            .get_or_create(model_id, || {
                let loader = Arc::clone(&self.image_loader);
                let id = model_id.to_string();
                let hook = self.begin_construction(model_id);
                self.observe_construction(model_id, Modality::Image, async move {
                    loader.load(&id, hook).await
                })
            })
            .await;

        self.metrics
            .set_resident(Modality::Image, self.image_sessions.len());
        result
    }

    /// Enter the downloading state and build the hook handed to the loader
    fn begin_construction(&self, model_id: &str) -> ProgressHook {
        self.lifecycle.begin_download(model_id);

        let forward = self.progress.hook(model_id);
        let lifecycle = self.lifecycle.clone();
        let model_id = model_id.to_string();
        Arc::new(move |percent| {
            lifecycle.record_progress(&model_id, percent);
            tracing::debug!("{} download progress: {}%", model_id, percent);
            forward(percent);
        })
    }

    /// Wrap a loader future with logging, timing and lifecycle updates
    fn observe_construction<H: ?Sized + Send + Sync + 'static>(
        &self,
        model_id: &str,
        modality: Modality,
        load: impl Future<Output = Result<Arc<H>>> + Send + 'static,
    ) -> impl Future<Output = Result<Arc<H>, SessionError>> + Send + 'static {
        let lifecycle = self.lifecycle.clone();
        let metrics = Arc::clone(&self.metrics);
        let model_id = model_id.to_string();

        async move {
            tracing::info!("Initializing {} model {}", modality, model_id);
            let started = Instant::now();

            match load.await {
                Ok(handle) => {
                    metrics.record_load(modality, true, started.elapsed());
                    lifecycle.complete_download(&model_id);
                    tracing::info!(
                        "✓ {} model {} ready ({:.1}s)",
                        modality,
                        model_id,
                        started.elapsed().as_secs_f64()
                    );
                    Ok(handle)
                }
                Err(e) => {
                    metrics.record_load(modality, false, started.elapsed());
                    let err = SessionError::initialization(&model_id, modality, &e);
                    lifecycle.mark_failed(&model_id, format!("{:#}", e));
                    tracing::error!("Failed to initialize {} model {}: {:#}", modality, model_id, e);
                    Err(err)
                }
            }
        }
    }

    fn refresh_resident_gauges(&self) {
        self.metrics
            .set_resident(Modality::Text, self.text_sessions.len());
        self.metrics
            .set_resident(Modality::Image, self.image_sessions.len());
    }
}
