//! Process-wide tracing/logging setup.

/// Initialize process-wide observability (tracing/logging).
///
/// Reads `RUST_LOG` and `LOG_FORMAT`. Safe to call multiple times;
/// subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use tracing::LogFormat;
