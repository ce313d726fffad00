/// Errors that can occur while managing the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        source: std::io::Error,
    },

    /// A pool needs at least one worker.
    #[error("worker count must be at least 1")]
    NoWorkers,
}

pub type Result<T> = std::result::Result<T, QueueError>;
