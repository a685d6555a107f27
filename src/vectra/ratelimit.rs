use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Client-side token bucket guarding the upstream request budget.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(requests: u32, period: Duration) -> Self {
        let capacity = f64::from(requests.max(1));
        let period = period.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            refill_per_sec: capacity / period,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits until a request slot is available and takes it.
    ///
    /// Waiters queue on the bucket lock, so slots are handed out in arrival order.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return;
        }

        let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec);
        debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting for a slot");
        tokio::time::sleep(wait).await;

        self.refill(&mut bucket);
        bucket.tokens = (bucket.tokens - 1.0).max(0.0);
    }

    /// Slots currently available without waiting.
    pub async fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens.floor() as u32
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;
    }
}
