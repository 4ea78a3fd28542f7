//! Read until one of a set of expectations is met.
//!
//! [`expect`] drives a [`LeaseReader`]: it reads, appends to an
//! [`OutputBuffer`], and asks the [`ExpectOpts`] after every read whether the
//! output satisfies a matcher. End of stream and upstream errors are offered
//! to the matchers too (end of stream as [`io::ErrorKind::UnexpectedEof`]), so
//! an expectation like [`eof`](crate::matcher::eof) can end the call cleanly.
//!
//! ```rust
//! use std::io::Write;
//! use ferrexpect::expect::expect;
//! use ferrexpect::matcher::{string, ExpectOpts};
//! use ferrexpect::stream::{pipe, ReaderLease};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ferrexpect::Error> {
//! let (reader, mut writer) = pipe();
//! let lease = ReaderLease::new(reader)?;
//! writer.write_all(b"login: ").unwrap();
//!
//! let opts = ExpectOpts::from_opts([string(["Password:"]), string(["login:"])])?;
//! let mut session = lease.new_reader(CancellationToken::new());
//! let found = expect(&mut session, &opts).await?;
//! assert_eq!(found.matched, 1);
//! assert_eq!(found.as_str_lossy(), "login: ");
//! # Ok(())
//! # }
//! ```

mod buffer;

pub use buffer::OutputBuffer;

use std::io;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::matcher::ExpectOpts;
use crate::stream::LeaseReader;

/// Default cap on the output retained by one expect call (1 MiB).
pub const DEFAULT_MAX_BUFFER: usize = 1024 * 1024;

/// Defaults for [`expect_with`].
#[derive(Debug, Clone)]
pub struct ExpectConfig {
    /// Per-read timeout, used when the options don't set one.
    pub timeout: Option<Duration>,

    /// Cap on retained output; older bytes are dropped past it.
    pub max_buffer: usize,

    /// Size of each read from the lease.
    pub read_size: usize,
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_buffer: DEFAULT_MAX_BUFFER,
            read_size: 1024,
        }
    }
}

/// Outcome of a successful expect call.
#[derive(Debug, Clone)]
pub struct Expectation {
    /// Output read during the call (up to the buffer cap).
    pub output: Vec<u8>,

    /// Index of the matcher that was satisfied, in registration order.
    pub matched: usize,

    /// Bytes dropped from the front of `output` because of the buffer cap.
    pub discarded: usize,

    /// Time spent reading.
    pub elapsed: Duration,
}

impl Expectation {
    /// Get the output as a string (lossy UTF-8).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

/// Read from `reader` until a matcher in `opts` is satisfied.
pub async fn expect(reader: &mut LeaseReader, opts: &ExpectOpts) -> Result<Expectation> {
    expect_with(reader, opts, &ExpectConfig::default()).await
}

/// [`expect`] with explicit defaults.
///
/// After a match, the matcher's callbacks (if any) run once with the output;
/// a failing callback is returned as [`Error::Callback`]. End of stream that
/// no matcher accepts is [`Error::NoMatch`].
///
/// A timeout, a cancellation or an upstream error that no matcher accepts is
/// returned as [`Error::Interrupted`] carrying the output read so far, since
/// the lease has already handed those bytes out. Feed them to
/// [`expect_buffered`] through an [`OutputBuffer`] to pick up where this call
/// stopped.
///
/// The reader's own deadline is restored before returning.
pub async fn expect_with(
    reader: &mut LeaseReader,
    opts: &ExpectOpts,
    config: &ExpectConfig,
) -> Result<Expectation> {
    let mut buffer = OutputBuffer::new(config.max_buffer);
    expect_buffered(reader, opts, config, &mut buffer)
        .await
        .map_err(|err| match err {
            Error::Timeout | Error::Cancelled | Error::Upstream(_) => Error::Interrupted {
                output: buffer.take(),
                source: Box::new(err),
            },
            other => other,
        })
}

/// [`expect_with`] accumulating into a caller-owned buffer.
///
/// The buffer is matched as it stands before anything is read, and keeps
/// its contents when the call fails with a timeout, a cancellation or an
/// upstream error, so a retry with the same buffer (on this reader or a new
/// one) sees every byte read so far. It is emptied on a match and on
/// [`Error::NoMatch`]. The buffer's own cap applies instead of
/// [`ExpectConfig::max_buffer`].
pub async fn expect_buffered(
    reader: &mut LeaseReader,
    opts: &ExpectOpts,
    config: &ExpectConfig,
    buffer: &mut OutputBuffer,
) -> Result<Expectation> {
    let previous = reader.read_deadline();
    let result = run(reader, opts, config, buffer).await;
    reader.set_read_deadline(previous);
    result
}

async fn run(
    reader: &mut LeaseReader,
    opts: &ExpectOpts,
    config: &ExpectConfig,
    buffer: &mut OutputBuffer,
) -> Result<Expectation> {
    let timeout = opts.timeout().or(config.timeout);
    let mut chunk = vec![0u8; config.read_size.max(1)];
    let start = Instant::now();

    let pending = if buffer.is_empty() {
        None
    } else {
        opts.position(buffer.as_slice())
    };

    let matched = match pending {
        Some(i) => {
            debug!("expect matched {} buffered bytes", buffer.len());
            i
        }
        None => loop {
            if let Some(timeout) = timeout {
                reader.set_read_deadline(Some(Instant::now() + timeout));
            }

            let (err, at_eof) = match reader.read(&mut chunk).await {
                Ok(0) => (io::Error::from(io::ErrorKind::UnexpectedEof), true),
                Ok(n) => {
                    buffer.extend(&chunk[..n]);
                    trace!("expect read {} bytes, buffer {} bytes", n, buffer.len());
                    match opts.position(buffer.as_slice()) {
                        Some(i) => break i,
                        None => continue,
                    }
                }
                Err(Error::Upstream(e)) => (e, false),
                Err(e) => {
                    debug!("expect interrupted after {} bytes: {}", buffer.len(), e);
                    return Err(e);
                }
            };

            if let Some(i) = opts.position(&err) {
                debug!("expect matched terminal condition: {}", err);
                break i;
            }
            if !at_eof {
                return Err(Error::Upstream(err));
            }
            return Err(Error::NoMatch {
                output: buffer.take(),
            });
        },
    };

    debug!("expect matched matcher #{} after {:?}", matched, start.elapsed());

    let discarded = buffer.discarded();
    let output = buffer.take();
    if discarded > 0 {
        warn!("expect output capped, {} leading bytes dropped", discarded);
    }

    if let Some(cb) = opts.matchers()[matched].as_callback() {
        cb.callback(&output)?;
    }

    Ok(Expectation {
        output,
        matched,
        discarded,
        elapsed: start.elapsed(),
    })
}
