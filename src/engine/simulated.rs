// Simulated engines - deterministic stand-ins for real model runtimes
//
// Used by the CLI when no backend is configured (demo mode) and by tests.
// Loads walk through a fixed list of progress percentages, optionally
// sleeping between steps, and count how many times they were invoked.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::types::{
    ChatMessage, ImageBuffer, ImageGenerationParams, ImageOutput, ProgressHook, Role,
    TextCompletion, TextGenerationParams,
};
use super::{ImageEngine, ImageEngineLoader, TextEngine, TextEngineLoader};
use crate::catalog::{resolve_image_source, resolve_text_source};

const DEFAULT_IMAGE_SIZE: u32 = 64;

/// What a simulated engine returns once loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedOutput {
    /// One candidate / one image
    Normal,
    /// Zero candidates / zero images
    Empty,
    /// Every request fails
    Failure,
}

fn default_progress_steps() -> Vec<u8> {
    (0..=100).step_by(10).collect()
}

/// Shared load behaviour for both simulated loaders
struct LoadScript {
    progress_steps: Vec<u8>,
    step_delay: Duration,
    pending_failures: AtomicUsize,
    loads: AtomicUsize,
}

impl LoadScript {
    fn new() -> Self {
        Self {
            progress_steps: default_progress_steps(),
            step_delay: Duration::ZERO,
            pending_failures: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
        }
    }

    async fn run(&self, model_id: &str, progress: &ProgressHook) -> Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let fail = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            bail!("simulated load failure for '{}'", model_id);
        }

        for &step in &self.progress_steps {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            progress(step);
        }
        Ok(())
    }
}

/// Simulated text loader
pub struct SimulatedTextLoader {
    script: LoadScript,
    output: SimulatedOutput,
}

impl SimulatedTextLoader {
    pub fn new() -> Self {
        Self {
            script: LoadScript::new(),
            output: SimulatedOutput::Normal,
        }
    }

    pub fn with_progress_steps(mut self, steps: Vec<u8>) -> Self {
        self.script.progress_steps = steps;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.script.step_delay = delay;
        self
    }

    pub fn with_output(mut self, output: SimulatedOutput) -> Self {
        self.output = output;
        self
    }

    /// Fail the next `count` loads before succeeding again
    pub fn failing_next(self, count: usize) -> Self {
        self.script.pending_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Number of times `load` has been invoked
    pub fn load_count(&self) -> usize {
        self.script.loads.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedTextLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEngineLoader for SimulatedTextLoader {
    async fn load(&self, model_id: &str, progress: ProgressHook) -> Result<Arc<dyn TextEngine>> {
        let source = resolve_text_source(model_id);
        tracing::debug!("Simulating load of {} ({})", model_id, source.model_id);

        self.script.run(model_id, &progress).await?;

        Ok(Arc::new(SimulatedTextEngine {
            model_id: model_id.to_string(),
            name: format!("simulated:{}", source.model_id),
            output: self.output,
        }))
    }
}

/// Text engine that answers with a canned demo reply
pub struct SimulatedTextEngine {
    model_id: String,
    name: String,
    output: SimulatedOutput,
}

#[async_trait]
impl TextEngine for SimulatedTextEngine {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: &TextGenerationParams,
    ) -> Result<TextCompletion> {
        match self.output {
            SimulatedOutput::Normal => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or_default();
                Ok(TextCompletion::single(format!(
                    "Response from model {}: this is a demo reply to your message \"{}\"",
                    self.model_id, last_user
                )))
            }
            SimulatedOutput::Empty => Ok(TextCompletion::default()),
            SimulatedOutput::Failure => bail!("simulated inference failure"),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Simulated image loader
pub struct SimulatedImageLoader {
    script: LoadScript,
    output: SimulatedOutput,
    image_size: u32,
}

impl SimulatedImageLoader {
    pub fn new() -> Self {
        Self {
            script: LoadScript::new(),
            output: SimulatedOutput::Normal,
            image_size: DEFAULT_IMAGE_SIZE,
        }
    }

    pub fn with_progress_steps(mut self, steps: Vec<u8>) -> Self {
        self.script.progress_steps = steps;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.script.step_delay = delay;
        self
    }

    pub fn with_output(mut self, output: SimulatedOutput) -> Self {
        self.output = output;
        self
    }

    /// Side length of the generated square images
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    pub fn failing_next(self, count: usize) -> Self {
        self.script.pending_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn load_count(&self) -> usize {
        self.script.loads.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageEngineLoader for SimulatedImageLoader {
    async fn load(&self, model_id: &str, progress: ProgressHook) -> Result<Arc<dyn ImageEngine>> {
        let repo = resolve_image_source(model_id);
        tracing::debug!("Simulating load of {} ({})", model_id, repo);

        self.script.run(model_id, &progress).await?;

        Ok(Arc::new(SimulatedImageEngine {
            name: format!("simulated:{}", repo),
            output: self.output,
            size: self.image_size,
        }))
    }
}

/// Image engine that paints a prompt-seeded gradient
pub struct SimulatedImageEngine {
    name: String,
    output: SimulatedOutput,
    size: u32,
}

impl SimulatedImageEngine {
    fn paint(&self, prompt: &str) -> ImageBuffer {
        // FNV-1a so the same prompt always yields the same picture
        let seed = prompt
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
                (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
            });
        let [r0, g0, b0, ..] = seed.to_le_bytes();

        let size = self.size.max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let fx = (x * 255 / size) as u8;
                let fy = (y * 255 / size) as u8;
                pixels.extend_from_slice(&[
                    r0.wrapping_add(fx),
                    g0.wrapping_add(fy),
                    b0.wrapping_add(fx / 2).wrapping_add(fy / 2),
                    255,
                ]);
            }
        }

        ImageBuffer {
            width: size,
            height: size,
            pixels,
        }
    }
}

#[async_trait]
impl ImageEngine for SimulatedImageEngine {
    async fn generate(&self, prompt: &str, _params: &ImageGenerationParams) -> Result<ImageOutput> {
        match self.output {
            SimulatedOutput::Normal => Ok(ImageOutput {
                images: vec![self.paint(prompt)],
            }),
            SimulatedOutput::Empty => Ok(ImageOutput::default()),
            SimulatedOutput::Failure => bail!("simulated inference failure"),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
