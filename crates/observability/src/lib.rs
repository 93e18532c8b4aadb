//! Process-wide logging setup.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize logging with the default (JSON) format.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::default());
}

pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
