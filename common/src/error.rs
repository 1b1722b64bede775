use thiserror::Error;

/// Problems that make a scan impossible before a single probe is sent.
///
/// These are the only errors that abort a run; everything that can go wrong
/// while probing is folded into the probe outcome instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid network '{input}': {reason}")]
    InvalidNetwork { input: String, reason: String },

    #[error("invalid port specification '{input}': {reason}")]
    InvalidPorts { input: String, reason: String },

    #[error("worker count must be at least 1")]
    InvalidWorkers,

    #[error("probe timeout must be greater than zero")]
    InvalidTimeout,

    #[error("raw socket access denied ({0}); run as root or grant CAP_NET_RAW")]
    InsufficientPrivilege(String),

    #[error("failed to open raw transport: {0}")]
    Transport(#[source] std::io::Error),
}

impl ConfigError {
    pub(crate) fn network(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn ports(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPorts {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Maps an error from opening a raw channel onto the privilege or transport variant.
    pub fn from_channel_error(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::InsufficientPrivilege(err.to_string()),
            _ => Self::Transport(err),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
