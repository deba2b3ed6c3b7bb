//! The leveled event engine shared by a [`Logger`](crate::Logger) and all of its sub-loggers.
//!
//! Every record is serialized once, as a single JSON line, and handed to the fan-out writer in a
//! single `write_all` call. Console outputs re-render that line on their own.

use std::{
    fmt,
    io::{self, Write},
    panic::Location,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::{
    Serialize,
    ser::{SerializeMap, Serializer},
};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{Fields, Level, config::WriteErrorHook, keys, trace::TraceIds, writer::FanOutWriter};

/// RFC 3339 in UTC with second precision.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Severity of a single record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Very fine-grained diagnostics.
    Trace,
    /// Diagnostics useful while developing.
    Debug,
    /// Normal operational events.
    Info,
    /// Unexpected but recoverable conditions.
    Warn,
    /// Failed operations.
    Error,
    /// Unrecoverable failure, may terminate the process.
    Fatal,
    /// Unrecoverable failure, may panic.
    Panic,
}

impl Severity {
    /// The lower-case name written to the `level` key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            _ => Self::Error,
        }
    }
}

/// The minimum [`Severity`] an engine emits, or [`LevelFilter::OFF`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelFilter(Option<Severity>);

impl LevelFilter {
    /// Emits nothing.
    pub const OFF: Self = Self(None);

    /// Emits `severity` and everything more severe.
    pub const fn at_least(severity: Severity) -> Self {
        Self(Some(severity))
    }

    /// Whether a record of `severity` passes this filter.
    pub fn enabled(self, severity: Severity) -> bool {
        self.0.is_some_and(|minimum| severity >= minimum)
    }
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Disabled => Self::OFF,
            Level::Trace => Self::at_least(Severity::Trace),
            Level::Debug => Self::at_least(Severity::Debug),
            Level::Info => Self::at_least(Severity::Info),
            Level::Warning => Self::at_least(Severity::Warn),
            Level::Error => Self::at_least(Severity::Error),
            Level::Fatal => Self::at_least(Severity::Fatal),
            Level::Panic => Self::at_least(Severity::Panic),
        }
    }
}

/// Source location a record was emitted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Caller<'a> {
    file: &'a str,
    line: u32,
}

impl<'a> Caller<'a> {
    pub(crate) fn new(file: &'a str, line: u32) -> Self {
        Self { file, line }
    }
}

impl From<&'static Location<'static>> for Caller<'static> {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for Caller<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Everything needed to serialize one record.
#[derive(Debug)]
pub(crate) struct Record<'a> {
    pub(crate) severity: Severity,
    pub(crate) caller: Option<Caller<'a>>,
    pub(crate) service: Option<&'a str>,
    pub(crate) trace: TraceIds,
    pub(crate) fields: &'a Fields,
    pub(crate) message: &'a str,
}

impl Record<'_> {
    /// Serializes the record as a single JSON object followed by a newline.
    pub(crate) fn to_json_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buffer = Vec::new();
        let mut serializer = serde_json::Serializer::new(&mut buffer);
        let mut map_serializer = serializer.serialize_map(None)?;

        map_serializer.serialize_entry(keys::LEVEL, &self.severity)?;
        if let Ok(time) = OffsetDateTime::now_utc().format(TIMESTAMP_FORMAT) {
            map_serializer.serialize_entry(keys::TIME, &time)?;
        }
        if let Some(caller) = &self.caller {
            map_serializer.serialize_entry(keys::CALLER, &format_args!("{caller}"))?;
        }
        if let Some(service) = self.service {
            map_serializer.serialize_entry(keys::SERVICE, service)?;
        }
        if let Some(span_id) = &self.trace.span_id {
            map_serializer.serialize_entry(keys::SPAN_ID, span_id)?;
        }
        if let Some(trace_id) = &self.trace.trace_id {
            map_serializer.serialize_entry(keys::TRACE_ID, trace_id)?;
        }

        for (key, value) in self.fields.iter() {
            if keys::RESERVED_KEYS.contains(key) {
                tracing::warn!(
                    "Attempting to log a reserved key `{key}` (value: {value:?}). Skipping."
                );
            } else {
                map_serializer.serialize_entry(key, value)?;
            }
        }

        map_serializer.serialize_entry(keys::MESSAGE, self.message)?;
        map_serializer.end()?;

        buffer.push(b'\n');
        Ok(buffer)
    }
}

/// The shared, thread-safe core of a logger tree.
pub(crate) struct Engine {
    filter: LevelFilter,
    writer: Mutex<FanOutWriter>,
    terminate_on_fatal: bool,
    on_write_error: Option<WriteErrorHook>,
    write_errors: AtomicU64,
}

impl Engine {
    pub(crate) fn new(
        filter: LevelFilter,
        writer: FanOutWriter,
        terminate_on_fatal: bool,
        on_write_error: Option<WriteErrorHook>,
    ) -> Self {
        Self {
            filter,
            writer: Mutex::new(writer),
            terminate_on_fatal,
            on_write_error,
            write_errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn enabled(&self, severity: Severity) -> bool {
        self.filter.enabled(severity)
    }

    pub(crate) fn terminate_on_fatal(&self) -> bool {
        self.terminate_on_fatal
    }

    pub(crate) fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Serializes and writes `record`. Failures are counted and reported, never returned.
    pub(crate) fn emit(&self, record: &Record<'_>) {
        let result = record
            .to_json_line()
            .map_err(io::Error::from)
            .and_then(|line| self.write_line(&line));

        if let Err(error) = result {
            self.report(&error);
        }
    }

    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line)?;
        writer.flush()
    }

    fn report(&self, error: &io::Error) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        match &self.on_write_error {
            Some(hook) => hook.call(error),
            None => tracing::warn!(%error, "Failed to write log record, the record was dropped"),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("filter", &self.filter)
            .field("terminate_on_fatal", &self.terminate_on_fatal)
            .field("write_errors", &self.write_errors())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{Value, json};

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record<'a>(fields: &'a Fields, trace: TraceIds) -> Record<'a> {
        Record {
            severity: Severity::Info,
            caller: Some(Caller::new("src/main.rs", 42)),
            service: Some("svc/a"),
            trace,
            fields,
            message: "hello",
        }
    }

    #[test]
    fn level_mapping_is_one_to_one() {
        assert_eq!(LevelFilter::from(Level::Disabled), LevelFilter::OFF);
        assert_eq!(
            LevelFilter::from(Level::Warning),
            LevelFilter::at_least(Severity::Warn)
        );
        assert_eq!(
            LevelFilter::from(Level::Panic),
            LevelFilter::at_least(Severity::Panic)
        );
    }

    #[test]
    fn filter_lets_through_equal_and_more_severe() {
        let filter = LevelFilter::from(Level::Info);

        assert!(!filter.enabled(Severity::Debug));
        assert!(filter.enabled(Severity::Info));
        assert!(filter.enabled(Severity::Panic));
        assert!(!LevelFilter::OFF.enabled(Severity::Panic));
    }

    #[test]
    fn record_keys_are_written_in_order() {
        let fields = Fields::new().with("order_id", "ord_1").with("attempt", 2);
        let trace = TraceIds {
            span_id: Some("00f067aa0ba902b7".to_owned()),
            trace_id: Some("4bf92f3577b34da6a3ce929d0e0e4736".to_owned()),
        };

        let line = record(&fields, trace)
            .to_json_line()
            .expect("record must serialize");
        let text = String::from_utf8(line).expect("JSON is UTF-8");

        assert!(text.ends_with('\n'));
        let keys_in_order = [
            "\"level\":\"info\"",
            "\"time\":",
            "\"caller\":\"src/main.rs:42\"",
            "\"service\":\"svc/a\"",
            "\"span_id\":\"00f067aa0ba902b7\"",
            "\"trace_id\":\"4bf92f3577b34da6a3ce929d0e0e4736\"",
            "\"order_id\":\"ord_1\"",
            "\"attempt\":2",
            "\"message\":\"hello\"",
        ];
        let positions: Vec<_> = keys_in_order
            .iter()
            .map(|key| text.find(key).expect("key must be present"))
            .collect();
        assert!(positions.windows(2).all(|pair| pair.first() < pair.get(1)));
    }

    #[test]
    fn reserved_user_keys_are_skipped() {
        let fields = Fields::new().with("level", "bogus").with("ok", true);

        let line = record(&fields, TraceIds::default())
            .to_json_line()
            .expect("record must serialize");
        let value: Value = serde_json::from_slice(&line).expect("valid JSON");

        assert_eq!(value["level"], json!("info"));
        assert_eq!(value["ok"], json!(true));
        assert!(value.get("span_id").is_none());
        assert!(value.get("trace_id").is_none());
    }

    #[test]
    fn write_failures_are_counted_and_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook = {
            let seen = Arc::clone(&seen);
            WriteErrorHook::new(move |error| {
                seen.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(error.kind());
            })
        };
        let engine = Engine::new(
            LevelFilter::from(Level::Debug),
            FanOutWriter::new(vec![Box::new(Broken)]),
            false,
            Some(hook),
        );

        let fields = Fields::new();
        engine.emit(&record(&fields, TraceIds::default()));

        assert_eq!(engine.write_errors(), 1);
        assert_eq!(
            *seen.lock().unwrap_or_else(PoisonError::into_inner),
            vec![io::ErrorKind::BrokenPipe]
        );
    }

    #[test]
    fn emitted_records_reach_the_writer() {
        let buffer = Buffer::default();
        let engine = Engine::new(
            LevelFilter::from(Level::Trace),
            FanOutWriter::new(vec![Box::new(buffer.clone())]),
            false,
            None,
        );

        let fields = Fields::new();
        engine.emit(&record(&fields, TraceIds::default()));
        engine.emit(&record(&fields, TraceIds::default()));

        let written = buffer.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(written.iter().filter(|byte| **byte == b'\n').count(), 2);
        assert_eq!(engine.write_errors(), 0);
    }
}
