/// A unit of deferred work.
///
/// A job owns everything it touches (pixel buffers included), so its lifetime
/// is independent of the producer that created it. It runs at most once.
pub trait Job: Send + 'static {
    /// Consume and execute the job.
    fn run(self: Box<Self>);

    /// Consume the job without running it.
    ///
    /// Called when the job is evicted from a full queue or thrown away by
    /// `stop`, so a job that holds a reservation can give it back.
    fn discard(self: Box<Self>) {}

    /// Short label used in logs.
    fn name(&self) -> &'static str {
        "job"
    }
}

impl<F> Job for F
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (*self)()
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}
