//! The logging facade.

use std::{fmt, panic::Location, process, sync::Arc};

use opentelemetry::Context;

use crate::{
    Config, Fields, Level, LoggerError,
    engine::{Caller, Engine, LevelFilter, Record, Severity},
    trace::TraceIds,
    writer::{self, FanOutWriter, SharedFile},
};

/// A structured logger bound to a service-name path.
///
/// All loggers derived from one another through [`Logger::sub`] share the same engine and
/// outputs, and are cheap to create. Only the logger returned by [`Logger::new`] owns the log
/// file and may close it.
///
/// Every leveled method takes the request-scoped [`Context`]; if trace injection is enabled, the
/// IDs of its active span are added to the record as `trace_id` and `span_id`.
pub struct Logger {
    engine: Arc<Engine>,
    service_names: Vec<String>,
    service: Option<String>,
    config: Arc<Config>,
    file: Option<SharedFile>,
}

impl Logger {
    /// Finalizes `config` (environment overlay, defaults, validation), opens every output and
    /// returns the root logger.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, an output has no format or the log file
    /// cannot be opened. Nothing is left open on failure.
    pub fn new(config: Config) -> Result<Self, LoggerError> {
        let config = config.finalize()?;
        let (writer, file) = writer::build_writers(&config)?;
        let engine = Engine::new(
            LevelFilter::from(config.level()),
            writer,
            config.terminate_on_fatal(),
            config.on_write_error.clone(),
        );

        let service_names = if config.service_name.is_empty() {
            Vec::new()
        } else {
            vec![config.service_name.clone()]
        };

        Ok(Self::from_parts(
            Arc::new(engine),
            service_names,
            Arc::new(config),
            file,
        ))
    }

    /// A logger that emits nothing and never terminates.
    pub(crate) fn disabled() -> Self {
        let mut config = Config {
            level: Some(Level::Disabled),
            terminate_on_fatal: Some(false),
            ..Config::default()
        };
        config.set_defaults();
        config.output.clear();

        let engine = Engine::new(LevelFilter::OFF, FanOutWriter::new(Vec::new()), false, None);
        Self::from_parts(Arc::new(engine), Vec::new(), Arc::new(config), None)
    }

    fn from_parts(
        engine: Arc<Engine>,
        service_names: Vec<String>,
        config: Arc<Config>,
        file: Option<SharedFile>,
    ) -> Self {
        let service = (!service_names.is_empty()).then(|| service_names.join("/"));
        Self {
            engine,
            service_names,
            service,
            config,
            file,
        }
    }

    /// Creates a child logger whose service name is this logger's name followed by `/name`.
    ///
    /// An empty `name` yields a child with the same service name. The child never owns the log
    /// file: closing it does nothing.
    #[must_use]
    pub fn sub(&self, name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        let mut service_names = self.service_names.clone();
        if !name.is_empty() {
            service_names.push(name.to_owned());
        }

        Self::from_parts(
            Arc::clone(&self.engine),
            service_names,
            Arc::clone(&self.config),
            None,
        )
    }

    /// Logs at [`Severity::Trace`].
    #[track_caller]
    pub fn trace(&self, cx: &Context, message: impl AsRef<str>, fields: impl Into<Fields>) {
        self.log(Severity::Trace, cx, message, fields);
    }

    /// Logs at [`Severity::Debug`].
    #[track_caller]
    pub fn debug(&self, cx: &Context, message: impl AsRef<str>, fields: impl Into<Fields>) {
        self.log(Severity::Debug, cx, message, fields);
    }

    /// Logs at [`Severity::Info`].
    #[track_caller]
    pub fn info(&self, cx: &Context, message: impl AsRef<str>, fields: impl Into<Fields>) {
        self.log(Severity::Info, cx, message, fields);
    }

    /// Logs at [`Severity::Warn`].
    #[track_caller]
    pub fn warn(&self, cx: &Context, message: impl AsRef<str>, fields: impl Into<Fields>) {
        self.log(Severity::Warn, cx, message, fields);
    }

    /// Logs at [`Severity::Error`].
    #[track_caller]
    pub fn error(&self, cx: &Context, message: impl AsRef<str>, fields: impl Into<Fields>) {
        self.log(Severity::Error, cx, message, fields);
    }

    /// Logs at [`Severity::Fatal`], then exits the process with status 1 unless
    /// [`Config::terminate_on_fatal`] is disabled.
    ///
    /// The process exits even if the record is filtered out by the level.
    #[track_caller]
    pub fn fatal(&self, cx: &Context, message: impl AsRef<str>, fields: impl Into<Fields>) {
        self.log(Severity::Fatal, cx, message, fields);
    }

    /// Logs at [`Severity::Panic`], then panics with `message` unless
    /// [`Config::terminate_on_fatal`] is disabled.
    ///
    /// # Panics
    ///
    /// Always, when termination is enabled, even if the record is filtered out by the level.
    #[track_caller]
    pub fn panic(&self, cx: &Context, message: impl AsRef<str>, fields: impl Into<Fields>) {
        self.log(Severity::Panic, cx, message, fields);
    }

    /// Logs at `severity`.
    ///
    /// # Panics
    ///
    /// For [`Severity::Panic`] when termination is enabled, see [`Logger::panic`].
    #[track_caller]
    pub fn log(
        &self,
        severity: Severity,
        cx: &Context,
        message: impl AsRef<str>,
        fields: impl Into<Fields>,
    ) {
        let caller = Caller::from(Location::caller());
        self.log_with_caller(severity, Some(caller), cx, message.as_ref(), fields);
    }

    pub(crate) fn log_with_caller(
        &self,
        severity: Severity,
        caller: Option<Caller<'_>>,
        cx: &Context,
        message: &str,
        fields: impl Into<Fields>,
    ) {
        if self.engine.enabled(severity) {
            let trace = if self.config.inject_trace_info() {
                TraceIds::from_context(cx)
            } else {
                TraceIds::default()
            };
            let fields = fields.into();

            self.engine.emit(&Record {
                severity,
                caller,
                service: self.service.as_deref(),
                trace,
                fields: &fields,
                message,
            });
        }

        if self.engine.terminate_on_fatal() {
            self.terminate(severity, message);
        }
    }

    #[allow(clippy::panic)]
    fn terminate(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Fatal => {
                if let Err(error) = self.close() {
                    tracing::warn!(%error, "Failed to close log file before exiting");
                }
                process::exit(1)
            }
            Severity::Panic => panic!("{message}"),
            _ => {}
        }
    }

    /// Flushes and closes the log file owned by this logger.
    ///
    /// Does nothing for sub-loggers, loggers without a file output and loggers that were
    /// already closed. Records logged to a closed file are dropped and reported as write errors.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Close`] if the file cannot be flushed or synced.
    pub fn close(&self) -> Result<(), LoggerError> {
        match &self.file {
            Some(file) => file.close().map_err(LoggerError::Close),
            None => Ok(()),
        }
    }

    /// The `/`-joined service-name path, if any.
    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// The finalized configuration this logger was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of records that could not be written, across this logger and all loggers sharing
    /// its engine.
    pub fn write_errors(&self) -> u64 {
        self.engine.write_errors()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("service", &self.service)
            .field("engine", &self.engine)
            .field("file", &self.file.as_ref().map(SharedFile::path))
            .finish_non_exhaustive()
    }
}
