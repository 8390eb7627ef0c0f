//! Logging support

#[cfg(feature = "std")]
use log::{debug, error, info, warn};

/// Enum that describes the level associated with a log message
#[derive(Debug, Eq, PartialEq)]
pub enum PkiLogLevel {
    /// Common error logging level
    Error,
    /// Common info logging level
    Info,
    /// Common warn logging level
    Warn,
    /// Common debug logging level
    Debug,
}

/// `log_message` routes a message to the log facade at the indicated level.
#[cfg(feature = "std")]
pub fn log_message(level: &PkiLogLevel, message: &str) {
    match level {
        PkiLogLevel::Error => error!("{}", message),
        PkiLogLevel::Warn => warn!("{}", message),
        PkiLogLevel::Info => info!("{}", message),
        PkiLogLevel::Debug => debug!("{}", message),
    }
}

/// `log_message` does nothing when std feature gate is not used
#[cfg(not(feature = "std"))]
pub fn log_message(_level: &PkiLogLevel, _message: &str) {}
