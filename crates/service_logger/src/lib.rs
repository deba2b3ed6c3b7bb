//! `service_logger` is a small, configuration-driven structured logging facade.
//!
//! It offers:
//! - A [`Logger`] with leveled methods (`trace` through `panic`) that enrich every record with the
//!   service name path and, optionally, the trace and span IDs of an OpenTelemetry [`Context`].
//! - A validated [`Config`] that can be filled programmatically or overlaid from `LOGGER_*`
//!   environment variables.
//! - Fan-out of each record to any combination of stdout, stderr and a (rotated) log file, each
//!   with its own [`Format`].
//! - A process-wide default logger ([`default_logger`] / [`set_default`]).
//! - A [`LoggerLayer`] forwarding `tracing` events into a [`Logger`] (feature `tracing-layer`).
//!
//! # Example
//!
//! ```
//! use opentelemetry::Context;
//! use service_logger::{Config, Format, Logger};
//!
//! let mut config = Config::default();
//! config.service_name = "checkout".to_owned();
//! config.output_format = Some(Format::Json);
//!
//! let logger = Logger::new(config)?;
//! let payments = logger.sub("payments");
//!
//! // Emits `"service":"checkout/payments"` along with the `amount_cents` field.
//! payments.info(&Context::current(), "charge accepted", [("amount_cents", 1299)]);
//!
//! logger.close()?;
//! # Ok::<(), service_logger::LoggerError>(())
//! ```
//!
//! [`Context`]: opentelemetry::Context

mod config;
mod engine;
mod fields;
mod global;
#[cfg(feature = "tracing-layer")]
mod layer;
mod logger;
mod trace;
mod writer;

use std::{io, path::PathBuf};

pub use self::{
    config::{Config, Format, Level, Output, WriteErrorHook},
    engine::{LevelFilter, Severity},
    fields::Fields,
    global::{default_logger, set_default},
    logger::Logger,
    writer::{ConsoleWriter, FanOutWriter, RotatingFile, RotationPolicy, resolve_format},
};
#[cfg(feature = "tracing-layer")]
pub use self::layer::LoggerLayer;

mod keys {
    use std::sync::LazyLock;

    use rustc_hash::FxHashSet;

    pub(crate) const LEVEL: &str = "level";
    pub(crate) const TIME: &str = "time";
    pub(crate) const CALLER: &str = "caller";
    pub(crate) const SERVICE: &str = "service";
    pub(crate) const SPAN_ID: &str = "span_id";
    pub(crate) const TRACE_ID: &str = "trace_id";
    pub(crate) const MESSAGE: &str = "message";
    pub(crate) const ERROR: &str = "error";
    #[cfg(feature = "tracing-layer")]
    pub(crate) const TARGET: &str = "target";

    /// Keys written by the engine itself; user fields may not reuse them.
    pub(crate) static RESERVED_KEYS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
        [LEVEL, TIME, CALLER, SERVICE, SPAN_ID, TRACE_ID, MESSAGE]
            .iter()
            .copied()
            .collect()
    });
}

/// Errors that can occur while building or closing a [`Logger`].
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// A configuration value is outside its set of valid values.
    #[error("invalid {field}: {value}, valid values: {expected}")]
    InvalidValue {
        /// Human readable name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The set (or range) of accepted values.
        expected: &'static str,
    },

    /// An environment variable could not be parsed into its configuration field.
    #[error("failed to parse environment variable `{variable}` (value `{value}`): {reason}")]
    Environment {
        /// Name of the environment variable.
        variable: &'static str,
        /// The raw value read from the environment.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Neither the per-target format nor the global output format is set.
    #[error("{target} and output format is empty")]
    UnresolvedFormat {
        /// The output target without a format.
        target: Output,
    },

    /// The log file could not be opened.
    #[error("failed to open log file `{path}`: {source}", path = .path.display())]
    FileOpen {
        /// Path of the log file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The log file could not be flushed or closed.
    #[error("failed to close log file: {0}")]
    Close(#[source] io::Error),
}
