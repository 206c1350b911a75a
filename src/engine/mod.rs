// Engine abstraction - text and image backends behind a common async interface
//
// Concrete model runtimes live outside this crate. A loader turns a model
// identifier into a ready engine handle, reporting percentages through the
// supplied hook while it downloads/initializes.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod openai;
pub mod simulated;
pub mod types;

pub use openai::{OpenAiTextEngine, OpenAiTextLoader};
pub use simulated::{SimulatedImageLoader, SimulatedOutput, SimulatedTextLoader};
pub use types::{
    ChatMessage, CompletionChoice, ImageBuffer, ImageGenerationParams, ImageOutput, Modality,
    ProgressHook, Role, TextCompletion, TextGenerationParams,
};

/// Initialized text model
#[async_trait]
pub trait TextEngine: Send + Sync {
    /// Run a chat completion over the given messages
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &TextGenerationParams,
    ) -> Result<TextCompletion>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Initialized image model
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Synthesize images for a prompt
    async fn generate(&self, prompt: &str, params: &ImageGenerationParams) -> Result<ImageOutput>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Builds text engines from model identifiers
#[async_trait]
pub trait TextEngineLoader: Send + Sync {
    async fn load(&self, model_id: &str, progress: ProgressHook) -> Result<Arc<dyn TextEngine>>;
}

/// Builds image engines from model identifiers
#[async_trait]
pub trait ImageEngineLoader: Send + Sync {
    async fn load(&self, model_id: &str, progress: ProgressHook) -> Result<Arc<dyn ImageEngine>>;
}
