// Hardware - accelerator probe and host summary

mod probe;

pub use probe::{
    AcceleratorQuery, AdapterInfo, CapabilityProbe, SystemAcceleratorQuery, FORCE_CPU_ENV,
};

use sysinfo::System;

/// Host resources relevant to running models locally
#[derive(Debug, Clone)]
pub struct HostSummary {
    /// Total system RAM in bytes
    pub total_memory: u64,
    /// Available system RAM in bytes
    pub available_memory: u64,
    /// Logical CPU threads
    pub cpu_threads: usize,
    pub accelerated: bool,
}

impl HostSummary {
    /// Collect host info; runs the probe if it hasn't run yet
    pub async fn collect(probe: &CapabilityProbe) -> Self {
        let mut system = System::new();
        system.refresh_memory();

        let cpu_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            total_memory: system.total_memory(),
            available_memory: system.available_memory(),
            cpu_threads,
            accelerated: probe.check().await,
        }
    }

    pub fn total_gb(&self) -> f64 {
        self.total_memory as f64 / 1_073_741_824.0
    }

    pub fn available_gb(&self) -> f64 {
        self.available_memory as f64 / 1_073_741_824.0
    }

    /// Format as status line
    pub fn format_status(&self) -> String {
        format!(
            "RAM: {:.1}GB free / {:.1}GB | CPU threads: {} | Accelerated: {}",
            self.available_gb(),
            self.total_gb(),
            self.cpu_threads,
            if self.accelerated { "yes" } else { "no (CPU fallback)" }
        )
    }
}
