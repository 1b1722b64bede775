//! Logging macros shared by every crate in the workspace.
//!
//! They forward to `tracing`; the CLI formatter decides how each level looks.
//! `success!` is an `INFO` event with its own target so it can be rendered
//! differently from plain status lines.

#[doc(hidden)]
pub use tracing;

pub const SUCCESS_TARGET: &str = "sweepr::success";

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::log::tracing::info!(target: $crate::log::SUCCESS_TARGET, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log::tracing::error!($($arg)*)
    };
}
