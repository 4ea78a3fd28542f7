//! Reader wrapper with socket-style read deadlines.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use log::debug;
use tokio::time::Instant;

use super::config::SourceConfig;
use super::source::{ReadLimits, Source};
use crate::error::Result;

/// Adds a settable read deadline to a blocking reader.
///
/// A read that times out doesn't abort the physical read underneath: it keeps
/// running in the background and whatever it returns is handed to the next
/// [`read`](Self::read), before any new physical read is issued. No byte is
/// lost because an earlier call gave up.
///
/// # Example
///
/// ```rust
/// use std::io::Write;
/// use ferrexpect::stream::{pipe, DeadlinePipe};
/// use tokio::time::Instant;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ferrexpect::Error> {
/// let (reader, mut writer) = pipe();
/// let mut pipe = DeadlinePipe::new(reader)?;
///
/// pipe.set_read_deadline(Some(Instant::now()));
/// writer.write_all(b"a").unwrap();
/// let mut buf = [0u8; 1];
/// assert!(pipe.read(&mut buf).await.unwrap_err().is_timeout());
///
/// pipe.set_read_deadline(None);
/// assert_eq!(pipe.read(&mut buf).await?, 1);
/// assert_eq!(&buf, b"a");
/// # Ok(())
/// # }
/// ```
pub struct DeadlinePipe {
    source: Arc<Source>,
    deadline: Option<Instant>,
}

impl DeadlinePipe {
    /// Wrap `reader` with the default configuration.
    pub fn new<R>(reader: R) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::with_config(reader, SourceConfig::default())
    }

    pub fn with_config<R>(reader: R, config: SourceConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Ok(Self {
            source: Source::new(reader, config)?,
            deadline: None,
        })
    }

    /// Set the deadline for future reads. `None` blocks indefinitely.
    ///
    /// A deadline in the past makes the next read fail with
    /// [`Error::Timeout`](crate::Error::Timeout) without waiting.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// The deadline currently applied to reads.
    pub fn read_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Read into `buf`.
    ///
    /// Returns `Ok(0)` at end of stream, [`Error::Timeout`](crate::Error::Timeout)
    /// if the deadline passes first, and the wrapped reader's own error as
    /// [`Error::Upstream`](crate::Error::Upstream).
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let limits = ReadLimits {
            deadline: self.deadline,
            cancel: None,
        };
        let result = self.source.read(buf, limits).await;
        if let Err(ref e) = result {
            debug!("deadline pipe read failed: {}", e);
        }
        result
    }
}

impl fmt::Debug for DeadlinePipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadlinePipe")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
