use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared rate limiter used both by a source adapter's `QuotaPolicy` and by
/// the LLM provider limiter that every Stage-2 worker draws from. Refills
/// to `capacity` once per `period_secs` rather than a continuous drip,
/// matching the coarse per-period quotas the source catalogs actually
/// advertise.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    period_secs: u64,
    remaining: AtomicU32,
    period_started_at: AtomicU64,
}

fn now_secs() -> u64 {
    SystemTime::now()
.duration_since(UNIX_EPOCH)
.map(|d| d.as_secs())
.unwrap_or(0)
}

impl TokenBucket {
    pub fn new(capacity: u32, period_secs: u64) -> Self {
        Self {
            capacity,
            period_secs,
            remaining: AtomicU32::new(capacity),
            period_started_at: AtomicU64::new(now_secs()),
        }
    }

    fn maybe_refill(&self) {
        let started = self.period_started_at.load(Ordering::Relaxed);
        let now = now_secs();
        if now.saturating_sub(started) >= self.period_secs {
            self.remaining.store(self.capacity, Ordering::Relaxed);
            self.period_started_at.store(now, Ordering::Relaxed);
        }
    }

    /// Attempts to take one token. Returns `false` without blocking when the
    /// bucket is empty; callers treat that as "skip this tuple/call this
    /// tick" rather than waiting.
    pub fn try_acquire(&self) -> bool {
        self.maybe_refill();
        loop {
            let current = self.remaining.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
.remaining
.compare_exchange(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
.is_ok()
            {
                return true;
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        self.maybe_refill();
        self.remaining.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_up_to_capacity_then_denies() {
        let bucket = TokenBucket::new(2, 3600);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn remaining_reports_current_budget() {
        let bucket = TokenBucket::new(3, 3600);
        bucket.try_acquire();
        assert_eq!(bucket.remaining(), 2);
    }
}
