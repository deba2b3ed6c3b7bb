use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::{RotatingFile, RotationPolicy};
use crate::{Config, LoggerError};

/// Opens `path` for appending, creating it if it does not exist.
pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(path)
}

enum LogFile {
    Plain(File),
    Rotating(RotatingFile),
}

impl LogFile {
    fn as_writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Plain(file) => file,
            Self::Rotating(file) => file,
        }
    }

    fn sync_all(&self) -> io::Result<()> {
        match self {
            Self::Plain(file) => file.sync_all(),
            Self::Rotating(file) => file.sync_all(),
        }
    }
}

/// The log file of a logger tree, shared by every sink that writes to it.
///
/// Once closed, writes fail instead of reopening the file.
#[derive(Clone)]
pub(crate) struct SharedFile {
    path: PathBuf,
    inner: Arc<Mutex<Option<LogFile>>>,
}

impl SharedFile {
    /// Opens the configured log file, rotated or plain.
    pub(crate) fn open(config: &Config) -> Result<Self, LoggerError> {
        let path = config.output_file_path.clone();
        let file = if config.rotate_enabled() {
            RotatingFile::open(path.clone(), RotationPolicy::from(config)).map(LogFile::Rotating)
        } else {
            open_append(&path).map(LogFile::Plain)
        }
        .map_err(|source| LoggerError::FileOpen {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            inner: Arc::new(Mutex::new(Some(file))),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and closes the file. Closing an already closed file succeeds.
    pub(crate) fn close(&self) -> io::Result<()> {
        let Some(mut file) = self.lock().take() else {
            return Ok(());
        };
        file.as_writer().flush()?;
        file.sync_all()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<LogFile>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn closed() -> io::Error {
    io::Error::other("log file is closed")
}

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.lock().as_mut() {
            Some(file) => file.as_writer().write(buf),
            None => Err(closed()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().as_mut() {
            Some(file) => file.as_writer().flush(),
            None => Err(closed()),
        }
    }
}

impl fmt::Debug for SharedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFile")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::Output;

    fn config(path: PathBuf, rotate: bool) -> Config {
        Config {
            output: vec![Output::File],
            output_file_path: path,
            rotate_enabled: Some(rotate),
            ..Config::default()
        }
        .finalize()
        .expect("configuration is valid")
    }

    #[test]
    fn writes_after_close_fail() {
        let dir = tempfile::tempdir().expect("failed to create temporary directory");
        let path = dir.path().join("app.log");
        let mut file = SharedFile::open(&config(path.clone(), false)).expect("file must open");

        file.write_all(b"kept\n").expect("write must succeed");
        file.close().expect("close must succeed");
        file.close().expect("second close is a no-op");

        assert!(file.is_closed());
        assert!(file.write_all(b"lost\n").is_err());
        assert_eq!(
            fs::read_to_string(&path).expect("file must be readable"),
            "kept\n"
        );
    }

    #[test]
    fn plain_mode_does_not_create_directories() {
        let dir = tempfile::tempdir().expect("failed to create temporary directory");
        let path = dir.path().join("missing/app.log");

        let error = SharedFile::open(&config(path.clone(), false)).expect_err("parent is missing");

        assert!(matches!(error, LoggerError::FileOpen { path: failed, .. } if failed == path));
    }

    #[test]
    fn rotating_mode_creates_directories() {
        let dir = tempfile::tempdir().expect("failed to create temporary directory");
        let path = dir.path().join("missing/app.log");

        let file = SharedFile::open(&config(path.clone(), true)).expect("file must open");

        assert_eq!(file.path(), path);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn new_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("failed to create temporary directory");
        let path = dir.path().join("app.log");

        open_append(&path).expect("file must open");

        let mode = fs::metadata(&path)
            .expect("file must exist")
            .permissions()
            .mode();
        assert_eq!(mode & 0o004, 0o004);
    }
}
