use std::{fmt, io};

use super::Sink;

/// Duplicates every write to each of its sinks, in order.
///
/// The first sink that fails aborts the write and its error is returned; sinks before it keep what
/// they received and sinks after it receive nothing.
pub struct FanOutWriter {
    sinks: Vec<Sink>,
}

impl FanOutWriter {
    /// Creates a writer over `sinks`.
    pub fn new(sinks: Vec<Box<dyn io::Write + Send>>) -> Self {
        Self { sinks }
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks, in which case every write is discarded.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl io::Write for FanOutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

impl fmt::Debug for FanOutWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutWriter")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
