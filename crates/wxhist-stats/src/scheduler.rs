use wxhist_core::Scheduler;

/// Yields to the tokio executor
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait::async_trait]
impl Scheduler for TokioScheduler {
    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}
