//! Synchronous in-memory pipe.
//!
//! A blocking byte pipe whose write end can close the stream with an error,
//! for feeding the stream primitives from code that produces bytes rather
//! than owning a [`Read`]. Writes never block; buffered bytes are delivered
//! before the close condition.

use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use bytes::{Buf, BytesMut};
use log::warn;

/// How the write end was closed.
enum Closed {
    Eof,
    /// The close error, until a reader takes it.
    Error(Option<io::Error>),
}

struct PipeState {
    buf: BytesMut,
    closed: Option<Closed>,
    reader_gone: bool,
}

struct Shared {
    state: Mutex<PipeState>,
    readable: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("pipe state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Create a connected reader/writer pair.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let shared = Arc::new(Shared {
        state: Mutex::new(PipeState {
            buf: BytesMut::new(),
            closed: None,
            reader_gone: false,
        }),
        readable: Condvar::new(),
    });
    (
        PipeReader {
            shared: Arc::clone(&shared),
        },
        PipeWriter { shared },
    )
}

/// Read end of a [`pipe`].
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl Read for PipeReader {
    /// Blocks until bytes are buffered or the writer closes.
    ///
    /// A close error is returned once; reads after that report end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.lock();
        loop {
            if !state.buf.is_empty() {
                let n = state.buf.len().min(buf.len());
                buf[..n].copy_from_slice(&state.buf[..n]);
                state.buf.advance(n);
                return Ok(n);
            }

            match &mut state.closed {
                Some(Closed::Eof) => return Ok(0),
                Some(Closed::Error(err)) => {
                    return match err.take() {
                        Some(e) => Err(e),
                        None => Ok(0),
                    };
                }
                None => {}
            }

            state = self
                .shared
                .readable
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.shared.lock().reader_gone = true;
    }
}

/// Write end of a [`pipe`]. Dropping it closes the pipe.
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Close the pipe; the reader sees end of stream once the buffer drains.
    pub fn close(&self) {
        self.close_with(Closed::Eof);
    }

    /// Close the pipe so the reader fails with `err` once the buffer drains.
    pub fn close_with_error(&self, err: io::Error) {
        self.close_with(Closed::Error(Some(err)));
    }

    fn close_with(&self, closed: Closed) {
        let mut state = self.shared.lock();
        if state.closed.is_none() {
            state.closed = Some(closed);
        }
        drop(state);
        self.shared.readable.notify_all();
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.lock();
        if state.closed.is_some() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write on closed pipe"));
        }
        if state.reader_gone {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"));
        }
        state.buf.extend_from_slice(buf);
        drop(state);
        self.shared.readable.notify_all();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_read_blocks_until_write() {
        let (mut reader, mut writer) = pipe();

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 8];
            let n = reader.read(&mut buf).unwrap();
            buf[..n].to_vec()
        });

        thread::sleep(Duration::from_millis(20));
        writer.write_all(b"hi").unwrap();
        assert_eq!(handle.join().unwrap(), b"hi");
    }

    #[test]
    fn test_buffered_bytes_before_close_error() {
        let (mut reader, mut writer) = pipe();
        writer.write_all(b"tail").unwrap();
        writer.close_with_error(io::Error::other("pipe error"));

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).unwrap_err();
        assert_eq!(out, b"tail");
        assert_eq!(err.to_string(), "pipe error");

        // The error is handed out once.
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_drop_writer_is_eof() {
        let (mut reader, writer) = pipe();
        drop(writer);
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_write_after_close_fails() {
        let (_reader, mut writer) = pipe();
        writer.close();
        let err = writer.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
