//! Progress-reporting stream wrapper for upload bodies.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::time::{Duration, Instant};

/// Called with `(bytes_sent, total_bytes)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Stream wrapper that counts bytes and reports them at most every `interval`
pub struct ProgressStream<S> {
    inner: S,
    sent: u64,
    total: u64,
    last_update: Instant,
    interval: Duration,
    callback: ProgressCallback,
}

impl<S> ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    pub fn new(inner: S, total: u64, callback: ProgressCallback) -> Self {
        Self {
            inner,
            sent: 0,
            total,
            last_update: Instant::now(),
            interval: Duration::from_millis(500),
            callback,
        }
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                self.sent += bytes.len() as u64;

                let now = Instant::now();
                if now.duration_since(self.last_update) >= self.interval {
                    (self.callback)(self.sent, self.total);
                    self.last_update = now;
                }

                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(None) => {
                // Final update on completion
                (self.callback)(self.sent, self.total);
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Percentage of `total` covered by `sent`, 100 for empty bodies.
pub fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        ((sent as f64 / total as f64) * 100.0).min(100.0)
    }
}
