// Session metrics - Prometheus counters for loads and generations
//
// Each manager owns its own registry so tests (and multiple managers in one
// process) never collide on metric names.

use anyhow::{Context, Result};
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use crate::engine::Modality;

/// Outcome label for a generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success,
    /// Engine produced nothing (text fallback / missing image)
    Empty,
    Error,
}

impl GenerationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationOutcome::Success => "success",
            GenerationOutcome::Empty => "empty",
            GenerationOutcome::Error => "error",
        }
    }
}

pub struct SessionMetrics {
    registry: Registry,
    session_loads: IntCounterVec,
    session_load_seconds: HistogramVec,
    generations: IntCounterVec,
    resident_sessions: IntGaugeVec,
}

impl SessionMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let session_loads = IntCounterVec::new(
            Opts::new(
                "neural_platform_session_loads_total",
                "Engine constructions by modality and outcome",
            ),
            &["modality", "outcome"],
        )?;
        let session_load_seconds = HistogramVec::new(
            HistogramOpts::new(
                "neural_platform_session_load_seconds",
                "Time spent constructing engines",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
            &["modality"],
        )?;
        let generations = IntCounterVec::new(
            Opts::new(
                "neural_platform_generations_total",
                "Generation requests by modality and outcome",
            ),
            &["modality", "outcome"],
        )?;
        let resident_sessions = IntGaugeVec::new(
            Opts::new(
                "neural_platform_resident_sessions",
                "Engine handles currently held in memory",
            ),
            &["modality"],
        )?;

        registry
            .register(Box::new(session_loads.clone()))
            .context("Failed to register session load counter")?;
        registry
            .register(Box::new(session_load_seconds.clone()))
            .context("Failed to register session load histogram")?;
        registry
            .register(Box::new(generations.clone()))
            .context("Failed to register generation counter")?;
        registry
            .register(Box::new(resident_sessions.clone()))
            .context("Failed to register resident session gauge")?;

        Ok(Self {
            registry,
            session_loads,
            session_load_seconds,
            generations,
            resident_sessions,
        })
    }

    pub fn record_load(&self, modality: Modality, success: bool, elapsed: Duration) {
        let outcome = if success { "success" } else { "error" };
        self.session_loads
            .with_label_values(&[modality.as_str(), outcome])
            .inc();
        self.session_load_seconds
            .with_label_values(&[modality.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_generation(&self, modality: Modality, outcome: GenerationOutcome) {
        self.generations
            .with_label_values(&[modality.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn set_resident(&self, modality: Modality, count: usize) {
        self.resident_sessions
            .with_label_values(&[modality.as_str()])
            .set(count as i64);
    }

    /// Successful (`true`) or failed engine constructions so far
    pub fn session_loads(&self, modality: Modality, success: bool) -> u64 {
        let outcome = if success { "success" } else { "error" };
        self.session_loads
            .with_label_values(&[modality.as_str(), outcome])
            .get()
    }

    pub fn generations(&self, modality: Modality, outcome: GenerationOutcome) -> u64 {
        self.generations
            .with_label_values(&[modality.as_str(), outcome.as_str()])
            .get()
    }

    pub fn resident(&self, modality: Modality) -> i64 {
        self.resident_sessions
            .with_label_values(&[modality.as_str()])
            .get()
    }

    /// Prometheus text exposition of every metric
    pub fn render(&self) -> Result<String> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .context("Failed to encode metrics")
    }
}
