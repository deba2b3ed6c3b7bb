use std::{
    ffi::OsStr,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use flate2::{Compression, write::GzEncoder};
use time::{
    Duration, OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

use super::file::open_append;
use crate::Config;

const BACKUP_TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]-[minute]-[second].[subsecond digits:3]"
);
const BACKUP_TIME_LENGTH: usize = "2024-05-01T10-00-00.000".len();
const COMPRESSED_SUFFIX: &str = ".gz";
const MEGABYTE: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// When a [`RotatingFile`] rotates and which backups it keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size in megabytes the file may reach before it is rotated.
    pub max_size_mb: u64,
    /// Number of backups kept, newest first.
    pub max_backups: u64,
    /// Backups older than this many days are removed.
    pub max_age_days: u64,
    /// Whether backups are gzip-compressed.
    ///
    /// Compression runs synchronously inside the write that triggers the rotation. A logger
    /// serializes writes, so concurrent callers wait until the backup is compressed.
    pub compress: bool,
}

impl RotationPolicy {
    fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(MEGABYTE)
    }
}

impl From<&Config> for RotationPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_size_mb: config.rotate_max_size_mb(),
            max_backups: config.rotate_max_backups(),
            max_age_days: config.rotate_max_age_days(),
            compress: config.rotate_compress(),
        }
    }
}

/// An append-only file that is renamed to a timestamped backup once it would grow past
/// [`RotationPolicy::max_size_mb`].
///
/// A file `logs/app.log` is rotated to `logs/app-2024-05-01T10-00-00.000.log` (UTC), which becomes
/// `logs/app-2024-05-01T10-00-00.000.log.gz` when compression is enabled. A second rotation within
/// the same millisecond gets a counter: `logs/app-2024-05-01T10-00-00.000-1.log`.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    file: File,
    size: u64,
}

impl RotatingFile {
    /// Opens `path` for appending, creating it and its parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or the file cannot be created.
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            policy,
            file,
            size,
        })
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the active file to a backup, starts a new one and prunes old backups.
    ///
    /// If the active file no longer exists, a new one is started without a backup. Failures to
    /// prune or compress backups are logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be renamed or reopened.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.path.try_exists()? {
            let backup = self.backup_path(OffsetDateTime::now_utc());
            fs::rename(&self.path, &backup)?;
        }
        self.file = open_append(&self.path)?;
        self.size = 0;

        if let Err(error) = self.prune_backups() {
            tracing::warn!(
                %error,
                path = %self.path.display(),
                "Failed to prune rotated log files"
            );
        }
        Ok(())
    }

    /// Flushes all data and metadata of the active file to disk.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the file system.
    pub fn sync_all(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn name_parts(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(OsStr::to_string_lossy)
            .unwrap_or_default()
            .into_owned();
        let extension = self
            .path
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_default();
        (stem, extension)
    }

    /// First unused backup name for `at`, plain or compressed.
    fn backup_path(&self, at: OffsetDateTime) -> PathBuf {
        let (stem, extension) = self.name_parts();
        let timestamp = at
            .format(BACKUP_TIME_FORMAT)
            .unwrap_or_else(|_| at.unix_timestamp().to_string());

        let mut sequence = 0_u64;
        loop {
            let name = match sequence {
                0 => format!("{stem}-{timestamp}{extension}"),
                _ => format!("{stem}-{timestamp}-{sequence}{extension}"),
            };
            let candidate = self.directory().join(name);
            if !candidate.exists() && !compressed_path(&candidate).exists() {
                return candidate;
            }
            sequence = sequence.saturating_add(1);
        }
    }

    /// Backups of this file, newest first.
    fn backups(&self) -> io::Result<Vec<Backup>> {
        let (stem, extension) = self.name_parts();
        let prefix = format!("{stem}-");
        let mut backups = Vec::new();

        for entry in fs::read_dir(self.directory())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let (rest, compressed) = match rest.strip_suffix(COMPRESSED_SUFFIX) {
                Some(rest) => (rest, true),
                None => (rest, false),
            };
            let Some((taken_at, sequence)) = rest
                .strip_suffix(extension.as_str())
                .and_then(parse_backup_stamp)
            else {
                continue;
            };

            backups.push(Backup {
                path: entry.path(),
                taken_at,
                sequence,
                compressed,
            });
        }

        backups.sort_by(|left, right| {
            (right.taken_at, right.sequence).cmp(&(left.taken_at, left.sequence))
        });
        Ok(backups)
    }

    /// Removes backups beyond the count or age limit, then compresses the survivors.
    fn prune_backups(&self) -> io::Result<()> {
        let max_age = i64::try_from(self.policy.max_age_days.saturating_mul(SECONDS_PER_DAY))
            .unwrap_or(i64::MAX);
        let cutoff = OffsetDateTime::now_utc().checked_sub(Duration::seconds(max_age));
        let keep = usize::try_from(self.policy.max_backups).unwrap_or(usize::MAX);

        let mut survivors = Vec::new();
        for (index, backup) in self.backups()?.into_iter().enumerate() {
            let expired = cutoff.is_some_and(|cutoff| backup.taken_at < cutoff);
            if index >= keep || expired {
                fs::remove_file(&backup.path)?;
            } else {
                survivors.push(backup);
            }
        }

        if self.policy.compress {
            for backup in survivors.iter().filter(|backup| !backup.compressed) {
                compress(&backup.path)?;
            }
        }
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let length = u64::try_from(buf.len()).unwrap_or(u64::MAX);
        let max_size = self.policy.max_size_bytes();
        if length > max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("write of {length} bytes exceeds the maximum log file size of {max_size} bytes"),
            ));
        }

        if self.size.saturating_add(length) > max_size {
            self.rotate()?;
        }

        let written = self.file.write(buf)?;
        self.size = self
            .size
            .saturating_add(u64::try_from(written).unwrap_or(u64::MAX));
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Debug)]
struct Backup {
    path: PathBuf,
    taken_at: OffsetDateTime,
    sequence: u64,
    compressed: bool,
}

/// Splits `2024-05-01T10-00-00.000` or `2024-05-01T10-00-00.000-3` into its time and counter.
fn parse_backup_stamp(stamp: &str) -> Option<(OffsetDateTime, u64)> {
    let (timestamp, sequence) = match stamp.split_at_checked(BACKUP_TIME_LENGTH)? {
        (timestamp, "") => (timestamp, 0),
        (timestamp, suffix) => {
            let digits = suffix.strip_prefix('-')?;
            if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
                return None;
            }
            (timestamp, digits.parse().ok()?)
        }
    };
    let taken_at = PrimitiveDateTime::parse(timestamp, BACKUP_TIME_FORMAT).ok()?;
    Some((taken_at.assume_utc(), sequence))
}

fn compressed_path(path: &Path) -> PathBuf {
    let mut compressed = path.as_os_str().to_owned();
    compressed.push(COMPRESSED_SUFFIX);
    compressed.into()
}

/// Replaces `path` with a gzip-compressed `<path>.gz`, never overwriting an existing archive.
fn compress(path: &Path) -> io::Result<()> {
    let mut source = File::open(path)?;
    let mut encoder = GzEncoder::new(
        File::create_new(compressed_path(path))?,
        Compression::default(),
    );
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?.sync_all()?;

    fs::remove_file(path)
}
