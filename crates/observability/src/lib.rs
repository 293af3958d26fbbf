//! Logging setup shared by the planledger binaries.

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init(subscriber::LogFormat::from_env());
}

/// Subscriber configuration (filter, output format).
pub mod subscriber;

pub use subscriber::LogFormat;
