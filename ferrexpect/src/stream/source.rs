//! Shared read source: one physical read at a time, results parked in a slot.
//!
//! The wrapped reader blocks and can't be interrupted, so a physical read is
//! never aborted. A dedicated worker thread owns the reader and performs one
//! read per request. Whoever waits on the source when the read completes
//! picks the result up; if the waiter gave up (deadline, cancellation) the
//! result stays in the slot for the next caller.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

use bytes::{Buf, Bytes, BytesMut};
use log::{debug, trace, warn};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::SourceConfig;
use crate::error::{Error, Result};

/// Where the physical reader currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Waiting for the next read request.
    Idle,

    /// A physical read is running on the worker.
    InFlight,

    /// The stream ended or failed; the worker has exited.
    Finished,
}

struct State {
    reader: ReaderState,

    /// Result of a completed physical read not yet handed out. Holds at most
    /// one item; a new physical read only starts once it is empty.
    pending: Option<io::Result<Bytes>>,
}

/// Deadline and cancellation bounding one wait on the source.
#[derive(Clone, Copy, Default)]
pub(crate) struct ReadLimits<'a> {
    pub deadline: Option<Instant>,
    pub cancel: Option<&'a CancellationToken>,
}

impl ReadLimits<'_> {
    /// Fail right away if the wait is already over.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(Error::Timeout);
        }
        Ok(())
    }

    /// Resolve once the deadline passes or the token is cancelled.
    pub async fn expired(&self) -> Error {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        let cancelled = async {
            match self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = cancelled => Error::Cancelled,
            _ = deadline => Error::Timeout,
        }
    }
}

pub(crate) struct Source {
    state: Mutex<State>,
    ready: Notify,
    requests: Sender<()>,
}

impl Source {
    /// Wrap `reader`, starting its worker thread.
    ///
    /// The worker exits once the stream ends, or after its current read once
    /// the source is dropped.
    pub fn new<R>(reader: R, config: SourceConfig) -> Result<Arc<Self>>
    where
        R: Read + Send + 'static,
    {
        let (requests, rx) = mpsc::channel();
        let source = Arc::new(Self {
            state: Mutex::new(State {
                reader: ReaderState::Idle,
                pending: None,
            }),
            ready: Notify::new(),
            requests,
        });

        let worker = Arc::downgrade(&source);
        let chunk_size = config.chunk_size.max(1);
        thread::Builder::new()
            .name("ferrexpect-reader".to_string())
            .spawn(move || read_worker(reader, rx, worker, chunk_size))
            .map_err(Error::Spawn)?;

        Ok(source)
    }

    /// Read into `buf`, waiting at most until `limits` expire.
    ///
    /// Callers must not wait on the same source concurrently; the lease
    /// serializes its readers and the pipe takes `&mut self`.
    pub async fn read(&self, buf: &mut [u8], limits: ReadLimits<'_>) -> Result<usize> {
        limits.check()?;
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if let Some(result) = self.try_take(buf) {
                return result;
            }

            tokio::select! {
                _ = self.ready.notified() => {}
                err = limits.expired() => {
                    debug!("read gave up waiting: {}", err);
                    return Err(err);
                }
            }
        }
    }

    /// Hand out the parked result, or make sure a physical read is running.
    fn try_take(&self, buf: &mut [u8]) -> Option<Result<usize>> {
        let mut state = self.lock();

        if let Some(pending) = state.pending.take() {
            return Some(match pending {
                Ok(mut data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    data.advance(n);
                    if !data.is_empty() {
                        state.pending = Some(Ok(data));
                    }
                    trace!("delivered {} bytes", n);
                    Ok(n)
                }
                Err(e) => Err(Error::Upstream(e)),
            });
        }

        match state.reader {
            ReaderState::Idle => {
                if self.requests.send(()).is_err() {
                    // The worker only hangs up after finishing the stream.
                    state.reader = ReaderState::Finished;
                    return Some(Ok(0));
                }
                state.reader = ReaderState::InFlight;
                None
            }
            ReaderState::InFlight => None,
            ReaderState::Finished => Some(Ok(0)),
        }
    }

    /// Park a physical read's result. Returns whether the stream is over.
    fn complete(&self, mut chunk: BytesMut, result: io::Result<usize>) -> bool {
        let mut state = self.lock();
        debug_assert!(state.pending.is_none(), "physical read started with a parked result");

        let finished = match result {
            Ok(0) => {
                debug!("upstream reached end of stream");
                true
            }
            Ok(n) => {
                trace!("physical read returned {} bytes", n);
                chunk.truncate(n);
                state.pending = Some(Ok(chunk.freeze()));
                false
            }
            Err(e) => {
                debug!("upstream failed: {}", e);
                state.pending = Some(Err(e));
                true
            }
        };
        state.reader = if finished {
            ReaderState::Finished
        } else {
            ReaderState::Idle
        };

        drop(state);
        self.ready.notify_one();
        finished
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("read source state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Worker loop: one physical read per request until the stream ends or the
/// source goes away.
fn read_worker<R: Read>(
    mut reader: R,
    requests: Receiver<()>,
    source: Weak<Source>,
    chunk_size: usize,
) {
    while requests.recv().is_ok() {
        let mut chunk = BytesMut::zeroed(chunk_size);
        let result = loop {
            match reader.read(&mut chunk) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        let Some(source) = source.upgrade() else {
            break;
        };
        if source.complete(chunk, result) {
            break;
        }
    }
    trace!("reader worker exiting");
}
