//! Host CPU/RAM readings via `sysinfo`.

use super::{HostMetrics, used_percent};
use std::time::Duration;
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tracing::debug;

/// CPU window actually used for a requested `window`.
///
/// Usage is the delta between two refreshes, and sysinfo needs at least
/// [`sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`] between them (200 ms on Linux).
pub fn effective_cpu_window(window: Duration) -> Duration {
    window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL)
}

/// [`HostMetrics`] backed by a `sysinfo::System`.
pub struct SysinfoHost {
    system: System,
    clamp_logged: bool,
}

impl SysinfoHost {
    pub fn new() -> Self {
        Self {
            system: System::new_with_specifics(
                RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
            ),
            clamp_logged: false,
        }
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetrics for SysinfoHost {
    fn cpu_percent(&mut self, window: Duration) -> f64 {
        let effective = effective_cpu_window(window);
        if effective > window && !self.clamp_logged {
            debug!(
                requested_ms = window.as_millis() as u64,
                effective_ms = effective.as_millis() as u64,
                "CPU window raised to the sysinfo minimum"
            );
            self.clamp_logged = true;
        }
        self.system.refresh_cpu_usage();
        std::thread::sleep(effective);
        self.system.refresh_cpu_usage();
        f64::from(self.system.global_cpu_usage())
    }

    fn ram_percent(&mut self) -> f64 {
        self.system.refresh_memory();
        used_percent(self.system.used_memory(), self.system.total_memory())
    }
}
