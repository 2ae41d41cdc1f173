/*!
# Runtime instrumentation components

The pieces linked into (and exercised by) the instrumented program: the
structured call logger, the typed value formatters with the baton
extraction, and the correlation tracker that bridges reflective lookups to
later dynamic invocations.

Everything here is configured lazily from the environment on first use,
never fails visibly, and stays alive for the life of the process. Test
seams: loggers accept an injected sink, trackers can be constructed
standalone and reset.
*/

pub mod correlation;
pub mod format;
pub mod logger;

pub use correlation::{CorrelationEntry, Tracker, TrackerMetrics};
pub use format::{extract_value_ptr, format_any, format_bytes, format_value, ValueHeader};
pub use logger::{log_call, CallArgs, Logger, CORRELATION_LOOKUP_KEY};

pub const ENV_LOG_PATH: &str = "INSTRUMENTATION_LOG_PATH";
pub const ENV_MAX_SEEN_ENTRIES: &str = "INSTRUMENTATION_MAX_SEEN_ENTRIES";
pub const ENV_MAX_CORRELATIONS: &str = "INSTRUMENTATION_MAX_CORRELATIONS";
pub const ENV_CORRELATION_MAX_AGE: &str = "INSTRUMENTATION_CORRELATION_MAX_AGE";
pub const ENV_CLEANUP_INTERVAL: &str = "INSTRUMENTATION_CLEANUP_INTERVAL";
pub const ENV_DEBUG_CORRELATION: &str = "INSTRUMENTATION_DEBUG_CORRELATION";
pub const ENV_DEBUG_LOG_PATH: &str = "INSTRUMENTATION_DEBUG_LOG_PATH";

pub const DEFAULT_MAX_SEEN_ENTRIES: usize = 500_000;
pub const DEFAULT_MAX_CORRELATIONS: usize = 100_000;
pub const DEFAULT_CORRELATION_MAX_AGE: u64 = 50_000;
pub const DEFAULT_CLEANUP_INTERVAL: u64 = 10_000;
pub const DEFAULT_DEBUG_LOG_PATH: &str = "/tmp/instrumentation-correlation-debug.log";

/// Positive integer from the environment, falling back on absence or any
/// non-positive/unparsable value.
pub(crate) fn env_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(value) => match value.parse::<usize>() {
            Ok(parsed) if parsed > 0 => parsed,
            _ => default,
        },
        Err(_) => default,
    }
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(value) => match value.parse::<u64>() {
            Ok(parsed) if parsed > 0 => parsed,
            _ => default,
        },
        Err(_) => default,
    }
}
