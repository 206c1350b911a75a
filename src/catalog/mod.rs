// Model catalog - static metadata for the models offered in the picker
//
// Also resolves a catalog identifier to the upstream artifact a runtime
// would actually fetch.

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::engine::Modality;

/// Catalog entry shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub modality: Modality,
    /// Approximate download size label (e.g. "4.7GB")
    pub size: &'static str,
    pub description: &'static str,
}

static BUILTIN_MODELS: Lazy<Vec<ModelDescriptor>> = Lazy::new(|| {
    vec![
        ModelDescriptor {
            id: "GPT-4o-mini",
            name: "GPT-4o-mini",
            modality: Modality::Text,
            size: "1.2GB",
            description: "Fast language model for chat",
        },
        ModelDescriptor {
            id: "Claude-3-Haiku",
            name: "Claude-3-Haiku",
            modality: Modality::Text,
            size: "800MB",
            description: "Compact model for dialogue",
        },
        ModelDescriptor {
            id: "Llama-3.1-8B",
            name: "Llama-3.1-8B",
            modality: Modality::Text,
            size: "4.7GB",
            description: "Capable open language model",
        },
        ModelDescriptor {
            id: "FLUX.1-dev",
            name: "FLUX.1-dev",
            modality: Modality::Image,
            size: "11.9GB",
            description: "High-quality image generation",
        },
        ModelDescriptor {
            id: "Stable-Diffusion-XL",
            name: "Stable Diffusion XL",
            modality: Modality::Image,
            size: "6.9GB",
            description: "Popular image synthesis model",
        },
        ModelDescriptor {
            id: "DALL-E-3",
            name: "DALL-E 3",
            modality: Modality::Image,
            size: "8.2GB",
            description: "Advanced image generator",
        },
    ]
});

/// Read-only view over the built-in catalog
pub struct Catalog;

impl Catalog {
    pub fn all() -> &'static [ModelDescriptor] {
        &BUILTIN_MODELS
    }

    pub fn by_modality(modality: Modality) -> impl Iterator<Item = &'static ModelDescriptor> {
        Self::all().iter().filter(move |m| m.modality == modality)
    }

    pub fn find(model_id: &str) -> Option<&'static ModelDescriptor> {
        Self::all().iter().find(|m| m.id == model_id)
    }
}

/// Prebuilt text model artifacts (MLC-compiled weights + runtime library)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextModelSource {
    pub model_id: &'static str,
    pub weights_url: &'static str,
    pub library_url: &'static str,
}

const LLAMA_SOURCE: TextModelSource = TextModelSource {
    model_id: "Llama-3.1-8B-Instruct-q4f32_1-MLC",
    weights_url: "https://huggingface.co/mlc-ai/Llama-3.1-8B-Instruct-q4f32_1-MLC",
    library_url: "https://raw.githubusercontent.com/mlc-ai/binary-mlc-llm-libs/main/Llama-3.1-8B-Instruct-q4f32_1-ctx4k_cs1k-webgpu.wasm",
};

const PHI_SOURCE: TextModelSource = TextModelSource {
    model_id: "Phi-3.5-mini-instruct-q4f16_1-MLC",
    weights_url: "https://huggingface.co/mlc-ai/Phi-3.5-mini-instruct-q4f16_1-MLC",
    library_url: "https://raw.githubusercontent.com/mlc-ai/binary-mlc-llm-libs/main/Phi-3.5-mini-instruct-q4f16_1-ctx4k_cs1k-webgpu.wasm",
};

/// Pick the text artifact for an identifier. Anything that isn't a Llama
/// build falls back to Phi-3.5-mini.
pub fn resolve_text_source(model_id: &str) -> &'static TextModelSource {
    if model_id.contains("Llama") {
        &LLAMA_SOURCE
    } else {
        &PHI_SOURCE
    }
}

/// Pick the diffusion repository for an image identifier
pub fn resolve_image_source(model_id: &str) -> &'static str {
    if model_id.contains("FLUX") {
        "black-forest-labs/FLUX.1-schnell"
    } else if model_id.contains("Stable") {
        "stabilityai/stable-diffusion-xl-base-1.0"
    } else {
        "runwayml/stable-diffusion-v1-5"
    }
}
