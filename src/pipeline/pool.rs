//! Admission control for rendering.
//!
//! Each render owns a whole browser process, so unbounded fan-out would let a
//! burst of submissions exhaust the host. [`BoundedRenderer`] puts a semaphore
//! in front of any [`PdfRenderer`]: at most `concurrency` renders run at once,
//! at most `queue_depth` callers wait for a slot, and anyone beyond that is
//! turned away immediately with [`ReportError::RenderBusy`].

use crate::config::RenderConfig;
use crate::error::ReportError;
use crate::pipeline::render::PdfRenderer;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Decrements the waiting counter when a caller stops waiting.
struct WaitGuard<'a> {
    waiting: &'a AtomicUsize,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::Relaxed);
    }
}

/// A [`PdfRenderer`] with bounded concurrency and a bounded wait queue.
pub struct BoundedRenderer {
    inner: Arc<dyn PdfRenderer>,
    permits: Semaphore,
    waiting: AtomicUsize,
    queue_depth: usize,
}

impl BoundedRenderer {
    pub fn new(inner: Arc<dyn PdfRenderer>, concurrency: usize, queue_depth: usize) -> Self {
        Self {
            inner,
            permits: Semaphore::new(concurrency.max(1)),
            waiting: AtomicUsize::new(0),
            queue_depth,
        }
    }

    pub fn from_config(inner: Arc<dyn PdfRenderer>, config: &RenderConfig) -> Self {
        Self::new(inner, config.concurrency, config.queue_depth)
    }

    /// Renders currently able to start without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Callers currently waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PdfRenderer for BoundedRenderer {
    async fn render(&self, html: &str) -> Result<Vec<u8>, ReportError> {
        let _permit = match self.permits.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                let depth = self.waiting.fetch_add(1, Ordering::Relaxed) + 1;
                let _guard = WaitGuard {
                    waiting: &self.waiting,
                };
                if depth > self.queue_depth {
                    warn!("Render queue full ({} waiting), rejecting", depth - 1);
                    return Err(ReportError::RenderBusy { waiting: depth - 1 });
                }
                debug!("Render slots busy, waiting (position {})", depth);
                self.permits
                    .acquire()
                    .await
                    .map_err(|_| ReportError::Internal("render pool closed".into()))?
            }
        };
        self.inner.render(html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Blocks every render until released; counts peak concurrency.
    struct GateRenderer {
        gate: Notify,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GateRenderer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Notify::new(),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PdfRenderer for GateRenderer {
        async fn render(&self, _html: &str) -> Result<Vec<u8>, ReportError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.gate.notified().await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(b"%PDF-1.4".to_vec())
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn limits_concurrency() {
        let inner = GateRenderer::new();
        let pool = Arc::new(BoundedRenderer::new(inner.clone(), 2, 10));

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move { pool.render("<p/>").await }));
        }
        settle().await;
        assert_eq!(inner.running.load(Ordering::SeqCst), 2);
        assert_eq!(pool.waiting(), 3);

        for _ in 0..5 {
            inner.gate.notify_waiters();
            settle().await;
        }
        for t in tasks {
            assert!(t.await.unwrap().is_ok());
        }
        assert_eq!(inner.peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.waiting(), 0);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn rejects_when_queue_is_full() {
        let inner = GateRenderer::new();
        let pool = Arc::new(BoundedRenderer::new(inner.clone(), 1, 1));

        let first = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.render("a").await })
        };
        settle().await;
        let second = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.render("b").await })
        };
        settle().await;

        let third = pool.render("c").await;
        assert!(matches!(third, Err(ReportError::RenderBusy { waiting: 1 })));
        assert_eq!(pool.waiting(), 1);

        for _ in 0..3 {
            inner.gate.notify_waiters();
            settle().await;
        }
        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn passes_inner_errors_through() {
        struct Failing;
        #[async_trait]
        impl PdfRenderer for Failing {
            async fn render(&self, _html: &str) -> Result<Vec<u8>, ReportError> {
                Err(ReportError::RenderTimeout { secs: 1 })
            }
        }
        let pool = BoundedRenderer::new(Arc::new(Failing), 1, 0);
        let err = pool.render("x").await.unwrap_err();
        assert!(matches!(err, ReportError::RenderTimeout { secs: 1 }));
        assert_eq!(pool.available(), 1);
    }
}
