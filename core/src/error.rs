use sweepr_common::{ConfigError, result::ScanResult};
use thiserror::Error;

/// The only ways a scan can end without a complete result.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The caller cancelled the run. `partial` holds every host whose port
    /// scan had started, with the ports confirmed open so far. When the
    /// sweep itself was cut short, it holds the hosts found alive so far,
    /// each with an empty port set.
    #[error("scan cancelled with {} host(s) recorded", .partial.len())]
    Cancelled { partial: ScanResult },
}
