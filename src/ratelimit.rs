// ABOUTME: Token-bucket limiter shared by every worker issuing API requests
// ABOUTME: Paces requests up front instead of waiting for 429 responses

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Slowest accepted pace, one request every ~17 minutes.
pub const MIN_RATE: f64 = 0.001;

/// Upper bound on a single wait, whatever the configured rate.
const MAX_WAIT: Duration = Duration::from_secs(1000);

#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    /// `rate` requests per second on average, bursting up to `burst`.
    pub fn new(rate: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        TokenBucket {
            capacity,
            refill_per_sec: if rate.is_nan() || rate < MIN_RATE {
                MIN_RATE
            } else {
                rate
            },
            state: Mutex::new(BucketState {
                tokens: capacity,
                last: Instant::now(),
            }),
        }
    }

    /// Take one token without blocking. Returns how long to wait otherwise.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        let elapsed = now.duration_since(state.last).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            let wait = Duration::try_from_secs_f64(missing / self.refill_per_sec)
                .unwrap_or(MAX_WAIT);
            Err(wait.min(MAX_WAIT))
        }
    }

    /// Block the calling thread until a token is available.
    pub fn acquire(&self) {
        while let Err(wait) = self.try_acquire() {
            std::thread::sleep(wait);
        }
    }
}
