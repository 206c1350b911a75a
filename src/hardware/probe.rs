// Capability probe - one-shot check for an accelerated compute adapter
//
// The query runs at most once per probe; every later call returns the
// cached answer. The result is advisory and never gates loading.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Environment variable that forces the CPU path when set to `1`/`true`
pub const FORCE_CPU_ENV: &str = "NEURAL_PLATFORM_FORCE_CPU";

/// Accelerator reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Backend family, e.g. "metal", "cuda", "dri"
    pub backend: String,
    /// Device path or name
    pub device: String,
}

/// Asks the platform for an accelerated adapter
pub trait AcceleratorQuery: Send + Sync {
    /// `Ok(None)` when the platform has no adapter to offer
    fn request_adapter(&self) -> Result<Option<AdapterInfo>>;
}

/// Detects Metal on Apple silicon and GPU device nodes on Linux
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAcceleratorQuery;

impl AcceleratorQuery for SystemAcceleratorQuery {
    fn request_adapter(&self) -> Result<Option<AdapterInfo>> {
        if force_cpu_requested(std::env::var(FORCE_CPU_ENV).ok().as_deref()) {
            tracing::debug!("{} set, skipping accelerator detection", FORCE_CPU_ENV);
            return Ok(None);
        }

        if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            return Ok(Some(AdapterInfo {
                backend: "metal".to_string(),
                device: "Apple GPU".to_string(),
            }));
        }

        if cfg!(target_os = "linux") {
            return detect_linux_adapter(Path::new("/dev"));
        }

        Ok(None)
    }
}

fn force_cpu_requested(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// Look for an NVIDIA device or a DRM render node under `dev`
fn detect_linux_adapter(dev: &Path) -> Result<Option<AdapterInfo>> {
    let nvidia = dev.join("nvidia0");
    if nvidia.exists() {
        return Ok(Some(AdapterInfo {
            backend: "cuda".to_string(),
            device: nvidia.display().to_string(),
        }));
    }

    let dri = dev.join("dri");
    if !dri.is_dir() {
        return Ok(None);
    }

    for entry in std::fs::read_dir(&dri)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with("renderD") {
            return Ok(Some(AdapterInfo {
                backend: "dri".to_string(),
                device: entry.path().display().to_string(),
            }));
        }
    }

    Ok(None)
}

/// Cached accelerator check - clone freely, clones share the cache
#[derive(Clone)]
pub struct CapabilityProbe {
    query: Arc<dyn AcceleratorQuery>,
    result: Arc<OnceCell<bool>>,
}

impl CapabilityProbe {
    pub fn new(query: Arc<dyn AcceleratorQuery>) -> Self {
        Self {
            query,
            result: Arc::new(OnceCell::new()),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemAcceleratorQuery))
    }

    /// True if an accelerated adapter is available. Never fails.
    pub async fn check(&self) -> bool {
        *self
            .result
            .get_or_init(|| async {
                match self.query.request_adapter() {
                    Ok(Some(adapter)) => {
                        tracing::info!(
                            "Accelerated compute available: {} ({})",
                            adapter.backend,
                            adapter.device
                        );
                        true
                    }
                    Ok(None) => {
                        tracing::warn!("No accelerated adapter found, falling back to CPU");
                        false
                    }
                    Err(e) => {
                        tracing::error!("Accelerator query failed, falling back to CPU: {:#}", e);
                        false
                    }
                }
            })
            .await
    }

    /// Cached answer, if the probe has already run
    pub fn cached(&self) -> Option<bool> {
        self.result.get().copied()
    }
}

impl Default for CapabilityProbe {
    fn default() -> Self {
        Self::system()
    }
}
