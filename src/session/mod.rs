// Session management - registries, progress, lifecycle and the generation façade

pub mod lifecycle;
pub mod manager;
pub mod progress;
pub mod registry;

pub use lifecycle::{LifecycleTracker, ModelSnapshot, ModelState, SessionStatus};
pub use manager::{ManagerBuilder, ModelSessionManager};
pub use progress::{ProgressCallback, ProgressChannel};
pub use registry::{EvictionHook, SessionRegistry};
