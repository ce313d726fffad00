//! Deferred work for streaming producers.
//!
//! Producer threads run inside camera or algorithm callbacks and must not
//! block on compression or socket writes. They hand owned [`Job`]s to a
//! [`WorkQueue`], whose fixed pool of workers drains a [`BlockingQueue`].

pub mod blocking;
pub mod error;
pub mod job;
pub mod pool;

pub use blocking::{BlockingQueue, Enqueued};
pub use error::{QueueError, Result};
pub use job::Job;
pub use pool::{QueueStats, WorkQueue, WorkQueueConfig};
