//! The process-wide default logger.
//!
//! Prefer passing a [`Logger`] explicitly; the default exists for code that cannot.

use std::{
    mem,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use crate::{Config, Logger};

static DEFAULT: LazyLock<RwLock<Arc<Logger>>> = LazyLock::new(|| {
    let logger = Logger::new(Config::default()).unwrap_or_else(|error| {
        tracing::warn!(%error, "Failed to build the default logger, falling back to a disabled logger");
        Logger::disabled()
    });
    RwLock::new(Arc::new(logger))
});

/// The current default logger.
///
/// Until [`set_default`] is called, this is a logger built from [`Config::default`] on first
/// use: `logfmt_no_color` records of level `debug` and above on stdout.
pub fn default_logger() -> Arc<Logger> {
    Arc::clone(&DEFAULT.read().unwrap_or_else(PoisonError::into_inner))
}

/// Replaces the default logger and returns the previous one.
///
/// The previous logger is not closed; callers holding it keep a working handle.
pub fn set_default(logger: impl Into<Arc<Logger>>) -> Arc<Logger> {
    let mut current = DEFAULT.write().unwrap_or_else(PoisonError::into_inner);
    mem::replace(&mut *current, logger.into())
}
