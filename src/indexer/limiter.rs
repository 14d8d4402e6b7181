//! Token bucket pacing for filesystem I/O.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default stat calls per second.
pub const DEFAULT_STAT_RATE: u32 = 200;

/// Default file hashes per second.
pub const DEFAULT_HASH_RATE: u32 = 30;

/// Seconds worth of tokens a bucket may accumulate while idle.
const BURST_SECONDS: u32 = 4;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Blocking token bucket shared by worker threads.
///
/// Tokens refill continuously at `rate` per second up to `burst`. Taking a
/// token from an empty bucket reserves it in advance, so concurrent callers
/// queue up behind each other instead of all waking at once.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// A limiter allowing `rate` operations per second with bursts of
    /// `burst`. Both are treated as at least one.
    #[must_use]
    pub fn new(rate: u32, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: f64::from(rate.max(1)),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    /// A limiter for `rate` operations per second with a few seconds of
    /// burst. `None` when `rate` is zero, meaning unlimited.
    #[must_use]
    pub fn per_second(rate: u32) -> Option<Self> {
        (rate > 0).then(|| Self::new(rate, rate.saturating_mul(BURST_SECONDS)))
    }

    /// Take one token, sleeping the calling thread until it is available.
    pub fn wait(&self) {
        let delay = self.reserve(Instant::now());
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    /// Take one token at `now` and return how long the caller must wait
    /// before using it.
    fn reserve(&self, now: Instant) -> Duration {
        let mut bucket = self.bucket.lock();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = elapsed.mul_add(self.rate, bucket.tokens).min(self.burst);
        bucket.last = bucket.last.max(now);
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.rate)
        }
    }
}
