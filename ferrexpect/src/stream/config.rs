//! Read source configuration.

/// Default size of a single physical read.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Configuration shared by [`DeadlinePipe`](super::DeadlinePipe) and
/// [`ReaderLease`](super::ReaderLease).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Buffer size for each physical read against the wrapped reader.
    ///
    /// A chunk larger than the caller's buffer is handed out over several
    /// reads. Zero is treated as one.
    pub chunk_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SourceConfig {
    /// Set the physical read size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}
