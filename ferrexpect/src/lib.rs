//! # Ferrexpect
//!
//! Cancel-safe stream readers and pattern matchers for expect-style session
//! automation.
//!
//! Ferrexpect is the core an expect loop sits on: it reads from a blocking
//! byte stream (a process, pty, telnet or ssh channel) and decides when the
//! output satisfies one of several expectations, with deadlines and
//! cancellation, without ever losing or duplicating a byte when a read gives
//! up.
//!
//! ## Features
//!
//! - Composable matchers: substring, regex, error kind, conjunction, callbacks
//! - [`DeadlinePipe`]: socket-style read deadlines over any blocking reader
//! - [`ReaderLease`]: cancelable logical readers sharing one stream
//! - A minimal [`expect`](expect::expect) loop tying the two together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrexpect::matcher::{eof, regexp_pattern, ExpectOpts};
//! use ferrexpect::{expect, ReaderLease};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let child = std::process::Command::new("sh")
//!         .args(["-c", "echo ready; sleep 1"])
//!         .stdout(std::process::Stdio::piped())
//!         .spawn()?;
//!     let stdout = child.stdout.ok_or("no stdout")?;
//!     let lease = ReaderLease::new(stdout)?;
//!
//!     let opts = ExpectOpts::from_opts([regexp_pattern([r"ready\s*$"]), eof()])?;
//!     let mut reader = lease.new_reader(CancellationToken::new());
//!     let found = expect::expect(&mut reader, &opts).await?;
//!     println!("matched #{}: {}", found.matched, found.as_str_lossy());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod expect;
pub mod matcher;
pub mod stream;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use expect::{ExpectConfig, Expectation};
pub use matcher::{ExpectOpt, ExpectOpts, Matcher, Subject};
pub use stream::{DeadlinePipe, LeaseReader, ReaderLease, SourceConfig};
