//! Structured JSON call logger.
//!
//! One record per line: operation first, then the argument pairs, then
//! caller, file, line. Records are deduplicated by fingerprint while the
//! seen-set is under its cap; the instrumented program must never fail
//! because logging failed, so sink errors are swallowed.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::Location;
use std::sync::OnceLock;

use parking_lot::Mutex;

use super::correlation;
use super::{env_usize, DEFAULT_MAX_SEEN_ENTRIES, ENV_LOG_PATH, ENV_MAX_SEEN_ENTRIES};
use crate::preprocess::registry::INSTRUMENTATION_PATTERN;

/// Sentinel argument key signalling that the runtime should resolve a
/// recorded correlation for this record.
pub const CORRELATION_LOOKUP_KEY: &str = "_correlation_lookup";

/// Argument key carrying the receiver baton in generated prologs.
const RECEIVER_KEY: &str = "v";

/// Frames from these modules are the logger's own; the caller is the first
/// frame past them.
const SELF_FRAME_PATTERNS: &[&str] = &["observer_core::instrument", "backtrace::"];

pub type CallArgs = Vec<(String, String)>;

pub struct Logger {
    sink: Mutex<Option<Box<dyn Write + Send>>>,
    seen: Mutex<HashSet<String>>,
    max_seen: usize,
}

impl Logger {
    /// Environment-driven construction: logging is disabled entirely when
    /// the log path is unset.
    pub fn from_env() -> Self {
        let sink: Option<Box<dyn Write + Send>> = match std::env::var(ENV_LOG_PATH) {
            Ok(path) if !path.is_empty() => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
                .map(|f| Box::new(f) as Box<dyn Write + Send>),
            _ => None,
        };

        Self {
            sink: Mutex::new(sink),
            seen: Mutex::new(HashSet::new()),
            max_seen: env_usize(ENV_MAX_SEEN_ENTRIES, DEFAULT_MAX_SEEN_ENTRIES),
        }
    }

    /// Construct with an explicit sink and dedup cap. Test seam.
    pub fn with_sink(sink: Box<dyn Write + Send>, max_seen: usize) -> Self {
        Self {
            sink: Mutex::new(Some(sink)),
            seen: Mutex::new(HashSet::new()),
            max_seen,
        }
    }

    #[track_caller]
    pub fn log_call(&self, operation: &str, args: CallArgs) {
        self.log_at(operation, args, Location::caller());
    }

    fn log_at(&self, operation: &str, mut args: CallArgs, location: &Location<'_>) {
        if self.sink.lock().is_none() {
            return;
        }

        let caller = caller_function_name();

        // Records originating inside the instrumentation itself are noise.
        if caller.contains(INSTRUMENTATION_PATTERN)
            || location.file().contains(INSTRUMENTATION_PATTERN)
        {
            return;
        }

        if wants_correlation_lookup(&args) {
            if let Some(receiver) = args.iter().find(|(name, _)| name == RECEIVER_KEY) {
                if let Ok(baton) = receiver.1.parse::<u64>() {
                    if baton != 0 {
                        correlation::debug_write(&format!(
                            "LOOKUP: operation={operation} receiverPtr={baton}"
                        ));
                        if let Some(entry) = correlation::lookup_by_ptr(baton) {
                            args.push(("method_name".to_string(), entry.method_name.clone()));
                            args.push(("correlation_seq".to_string(), entry.sequence.to_string()));
                        }
                    }
                }
            }
        }

        let fingerprint = fingerprint(operation, &caller, location, &args);
        {
            let mut seen = self.seen.lock();
            if seen.len() < self.max_seen {
                if seen.contains(&fingerprint) {
                    return;
                }
                seen.insert(fingerprint);
            }
            // Past the cap deduplication is disabled: keep emitting,
            // duplicates permitted.
        }

        let record = render_record(operation, &args, &caller, location);

        let mut sink = self.sink.lock();
        if let Some(sink) = sink.as_mut() {
            let _ = sink.write_all(record.as_bytes());
        }
    }
}

/// The process-global logger, configured from the environment on first use.
pub fn global() -> &'static Logger {
    static LOGGER: OnceLock<Logger> = OnceLock::new();
    LOGGER.get_or_init(Logger::from_env)
}

/// Log one call record through the global logger.
#[track_caller]
pub fn log_call(operation: &str, args: CallArgs) {
    global().log_call(operation, args);
}

fn wants_correlation_lookup(args: &CallArgs) -> bool {
    args.iter().any(|(name, _)| name == CORRELATION_LOOKUP_KEY)
}

/// Fingerprint for deduplication: operation, caller location, and the
/// name/value pairs in sorted order so argument ordering cannot split
/// otherwise-identical records.
fn fingerprint(operation: &str, caller: &str, location: &Location<'_>, args: &CallArgs) -> String {
    let mut key = format!("{operation}:{caller}:{}:{}", location.file(), location.line());
    let mut sorted: Vec<&(String, String)> = args.iter().collect();
    sorted.sort();
    for (name, value) in sorted {
        key.push(':');
        key.push_str(name);
        key.push(':');
        key.push_str(value);
    }
    key
}

fn render_record(
    operation: &str,
    args: &CallArgs,
    caller: &str,
    location: &Location<'_>,
) -> String {
    let mut buf = String::with_capacity(256);
    buf.push_str("{\"operation\":\"");
    push_escaped(&mut buf, operation);
    buf.push('"');

    for (name, value) in args {
        buf.push_str(",\"");
        push_escaped(&mut buf, name);
        buf.push_str("\":\"");
        push_escaped(&mut buf, value);
        buf.push('"');
    }

    buf.push_str(",\"caller\":\"");
    push_escaped(&mut buf, caller);
    buf.push_str("\",\"file\":\"");
    push_escaped(&mut buf, location.file());
    buf.push_str("\",\"line\":");
    buf.push_str(&location.line().to_string());
    buf.push_str("}\n");
    buf
}

fn push_escaped(buf: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                buf.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => buf.push(c),
        }
    }
}

/// Best-effort name of the first stack frame outside the logger's own
/// modules. Symbol resolution can fail on stripped binaries; `unknown` is
/// an acceptable answer and never suppresses a record by itself.
fn caller_function_name() -> String {
    let mut found = String::from("unknown");
    backtrace::trace(|frame| {
        let mut keep_walking = true;
        backtrace::resolve_frame(frame, |symbol| {
            if let Some(name) = symbol.name() {
                let name = name.to_string();
                if SELF_FRAME_PATTERNS
                    .iter()
                    .any(|pattern| name.contains(pattern))
                {
                    return;
                }
                if name.contains("caller_function_name") {
                    return;
                }
                found = name;
                keep_walking = false;
            }
        });
        keep_walking
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn args(pairs: &[(&str, &str)]) -> CallArgs {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn record_shape_and_key_order() {
        let buf = SharedBuf::default();
        let logger = Logger::with_sink(Box::new(buf.clone()), 100);

        logger.log_call("unsafe.Add", args(&[("ptr", "123"), ("len", "8")]));

        let out = buf.contents();
        assert!(out.starts_with("{\"operation\":\"unsafe.Add\",\"ptr\":\"123\",\"len\":\"8\",\"caller\":\""));
        assert!(out.contains(",\"file\":\""));
        assert!(out.contains(",\"line\":"));
        assert!(out.ends_with("}\n"));

        // Key order: operation, args, caller, file, line.
        let op = out.find("\"operation\"").unwrap();
        let ptr = out.find("\"ptr\"").unwrap();
        let caller = out.find("\"caller\"").unwrap();
        let file = out.find("\"file\"").unwrap();
        let line = out.find("\"line\"").unwrap();
        assert!(op < ptr && ptr < caller && caller < file && file < line);
    }

    #[test]
    fn duplicate_records_are_dropped() {
        let buf = SharedBuf::default();
        let logger = Logger::with_sink(Box::new(buf.clone()), 100);

        for _ in 0..3 {
            logger.log_call("unsafe.Add", args(&[("ptr", "1")]));
        }

        assert_eq!(buf.contents().lines().count(), 1);
    }

    #[test]
    fn distinct_arguments_are_distinct_records() {
        let buf = SharedBuf::default();
        let logger = Logger::with_sink(Box::new(buf.clone()), 100);

        logger.log_call("unsafe.Add", args(&[("ptr", "1")]));
        logger.log_call("unsafe.Add", args(&[("ptr", "2")]));

        assert_eq!(buf.contents().lines().count(), 2);
    }

    #[test]
    fn past_the_cap_duplicates_flow_through() {
        let buf = SharedBuf::default();
        let logger = Logger::with_sink(Box::new(buf.clone()), 0);

        logger.log_call("unsafe.Add", args(&[("ptr", "1")]));
        logger.log_call("unsafe.Add", args(&[("ptr", "1")]));

        assert_eq!(buf.contents().lines().count(), 2);
    }

    #[test]
    fn values_are_escaped() {
        let buf = SharedBuf::default();
        let logger = Logger::with_sink(Box::new(buf.clone()), 100);

        logger.log_call(
            "reflect.Value.SetString",
            args(&[("x", "quote\" slash\\ newline\n tab\t bell\u{7}")]),
        );

        let out = buf.contents();
        assert!(out.contains("quote\\\" slash\\\\ newline\\n tab\\t bell\\u0007"));
        // The record itself is still one line.
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn correlation_lookup_augments_the_record() {
        let buf = SharedBuf::default();
        let logger = Logger::with_sink(Box::new(buf.clone()), 100);

        // Seed the global tracker and hand the logger the same baton.
        correlation::global().record_ptr("GetName", 0xabcd_0001);
        let baton = format!("{}", 0xabcd_0001u64);
        logger.log_call(
            "reflect.Value.Call",
            args(&[("v", baton.as_str()), ("_correlation_lookup", "true")]),
        );

        let out = buf.contents();
        assert!(out.contains("\"method_name\":\"GetName\""));
        assert!(out.contains("\"correlation_seq\":\""));
    }

    #[test]
    fn missing_correlation_leaves_record_unaugmented() {
        let buf = SharedBuf::default();
        let logger = Logger::with_sink(Box::new(buf.clone()), 100);

        logger.log_call(
            "reflect.Value.Call",
            args(&[("v", "99990001"), ("_correlation_lookup", "true")]),
        );

        let out = buf.contents();
        assert!(out.contains("\"_correlation_lookup\":\"true\""));
        assert!(!out.contains("method_name"));
    }
}
