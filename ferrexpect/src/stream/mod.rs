//! Cancel-safe stream primitives.
//!
//! Both primitives wrap a blocking [`std::io::Read`] that can't be
//! interrupted. Physical reads happen one at a time on a background thread;
//! a read that a caller gave up on still completes, and its bytes go to the
//! next caller.

pub mod config;
mod deadline;
mod lease;
pub mod pipe;
mod source;

pub use config::SourceConfig;
pub use deadline::DeadlinePipe;
pub use lease::{LeaseReader, ReaderLease};
pub use pipe::{pipe, PipeReader, PipeWriter};
