// neural-platform - on-demand model sessions for text and image generation
// Library exports

pub mod catalog;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod engine;
pub mod errors;
pub mod hardware;
pub mod logging;
pub mod metrics;
pub mod session;

pub use errors::{SessionError, EMPTY_COMPLETION_FALLBACK};
pub use session::{ModelSessionManager, ModelState, SessionStatus};
