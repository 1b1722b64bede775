use std::time::Duration;

use crate::error::ConfigError;
use crate::network::ports::PortRange;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Engine settings shared by both scan phases.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// How long a single probe waits for its reply. There are no retries.
    pub timeout: Duration,
    /// Maximum number of probes in flight at once.
    pub workers: usize,
    /// Ports probed on every live host.
    pub ports: PortRange,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            workers: num_cpus::get(),
            ports: PortRange::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Output settings for the terminal front end.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// 0 prints everything, 1 drops headers, 2 prints bare results only.
    pub quiet: u8,
    /// Disables the live progress bar.
    pub no_progress: bool,
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
