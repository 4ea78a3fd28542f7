//! Cancel-safe logical readers over one shared stream.
//!
//! A [`ReaderLease`] owns the stream. Each consumer asks it for a
//! [`LeaseReader`] bound to a [`CancellationToken`]; cancelling the token ends
//! that reader's reads without touching the stream. A physical read that was
//! running for a reader when it was cancelled still completes, and its bytes
//! go to whichever reader reads next.
//!
//! Logical reads take turns through a fair mutex, so concurrently waiting
//! readers are served in the order they started reading. Only the reader
//! holding the turn waits on the stream.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use log::{debug, trace};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::SourceConfig;
use super::source::{ReadLimits, Source};
use crate::error::Result;

struct LeaseInner {
    source: Arc<Source>,
    turn: Mutex<()>,
}

/// Shares one blocking stream between a succession of cancelable readers.
///
/// Cloning the lease shares the same stream.
///
/// # Example
///
/// ```rust
/// use std::io::Write;
/// use ferrexpect::stream::{pipe, ReaderLease};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ferrexpect::Error> {
/// let (reader, mut writer) = pipe();
/// let lease = ReaderLease::new(reader)?;
///
/// let token = CancellationToken::new();
/// let mut first = lease.new_reader(token.clone());
/// token.cancel();
/// assert!(first.read(&mut [0u8; 8]).await.unwrap_err().is_cancelled());
///
/// writer.write_all(b"banana").unwrap();
/// let mut second = lease.new_reader(CancellationToken::new());
/// let mut buf = [0u8; 8];
/// let n = second.read(&mut buf).await?;
/// assert_eq!(&buf[..n], b"banana");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReaderLease {
    inner: Arc<LeaseInner>,
}

impl ReaderLease {
    /// Take ownership of `reader` with the default configuration.
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
            inner: Arc::new(LeaseInner {
                source: Source::new(reader, config)?,
                turn: Mutex::new(()),
            }),
        })
    }

    /// Create a logical reader that stops reading once `cancel` fires.
    pub fn new_reader(&self, cancel: CancellationToken) -> LeaseReader {
        LeaseReader {
            lease: Arc::clone(&self.inner),
            cancel,
            deadline: None,
        }
    }
}

impl fmt::Debug for ReaderLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderLease").finish_non_exhaustive()
    }
}

/// A logical reader handed out by [`ReaderLease::new_reader`].
///
/// Valid until its token is cancelled or the stream ends. Reads on a
/// cancelled reader fail with [`Error::Cancelled`](crate::Error::Cancelled)
/// and consume nothing.
pub struct LeaseReader {
    lease: Arc<LeaseInner>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl LeaseReader {
    /// Bound this reader's reads by a deadline. `None` waits indefinitely.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub fn read_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The token this reader was created with.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Read the next bytes of the shared stream into `buf`.
    ///
    /// Returns `Ok(0)` at end of stream. If the token fires or the deadline
    /// passes first, returns [`Error::Cancelled`](crate::Error::Cancelled) or
    /// [`Error::Timeout`](crate::Error::Timeout) at once; a physical read
    /// already running keeps going and its result waits for the next read.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let limits = ReadLimits {
            deadline: self.deadline,
            cancel: Some(&self.cancel),
        };
        limits.check()?;

        let _turn = tokio::select! {
            turn = self.lease.turn.lock() => turn,
            err = limits.expired() => {
                debug!("lease reader gave up waiting for its turn: {}", err);
                return Err(err);
            }
        };
        trace!("lease reader holds the turn");

        self.lease.source.read(buf, limits).await
    }

    /// Read until `buf` is full, the stream ends, or the read is interrupted.
    ///
    /// Returns the number of bytes read. Bytes read before a timeout or
    /// cancellation are kept in `buf` and counted; the error is only returned
    /// if nothing was read.
    pub async fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if filled > 0 && e.is_temporary() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl fmt::Debug for LeaseReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseReader")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
