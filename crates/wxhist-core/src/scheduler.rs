/// Records processed between two scheduler yields
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Cooperative scheduling point for long-running computations.
///
/// Implementations return control to their executor and resume later;
/// callers must produce the same output regardless of how long a yield takes.
#[async_trait::async_trait]
pub trait Scheduler: Send + Sync {
    async fn yield_now(&self);
}
