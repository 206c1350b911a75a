// Session errors - failure taxonomy for session construction and generation
//
// Errors carry rendered messages rather than boxed sources so one failed
// construction can be handed to every caller waiting on it.

use thiserror::Error;

use crate::engine::Modality;

/// Reply used when a text engine returns no usable candidate
pub const EMPTY_COMPLETION_FALLBACK: &str = "Error generating response";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The engine loader failed; nothing was stored for the model
    #[error("failed to initialize {modality} model '{model_id}': {message}")]
    Initialization {
        model_id: String,
        modality: Modality,
        message: String,
    },

    /// The engine accepted the request but failed to produce a result
    #[error("{modality} generation with '{model_id}' failed: {message}")]
    Inference {
        model_id: String,
        modality: Modality,
        message: String,
    },

    #[error("model '{model_id}' did not produce an image")]
    EmptyImage { model_id: String },

    #[error("failed to encode image from '{model_id}': {message}")]
    Encoding { model_id: String, message: String },
}

impl SessionError {
    pub fn initialization(model_id: &str, modality: Modality, error: &anyhow::Error) -> Self {
        Self::Initialization {
            model_id: model_id.to_string(),
            modality,
            message: format!("{:#}", error),
        }
    }

    pub fn inference(model_id: &str, modality: Modality, error: &anyhow::Error) -> Self {
        Self::Inference {
            model_id: model_id.to_string(),
            modality,
            message: format!("{:#}", error),
        }
    }

    pub fn encoding(model_id: &str, error: &anyhow::Error) -> Self {
        Self::Encoding {
            model_id: model_id.to_string(),
            message: format!("{:#}", error),
        }
    }

    /// Model the failure relates to
    pub fn model_id(&self) -> &str {
        match self {
            Self::Initialization { model_id, .. }
            | Self::Inference { model_id, .. }
            | Self::EmptyImage { model_id }
            | Self::Encoding { model_id, .. } => model_id,
        }
    }
}
