//! Admission control for the serving boundary. Rate-limited routes are
//! delayed, concurrency-limited routes are rejected; the two never mix.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Paces callers to a steady `rate` events per second.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `rate` must be positive, finite and large enough that `1 / rate`
    /// seconds fits in a [`Duration`].
    pub fn new(rate: f64) -> crate::Result<Self> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(crate::Error::BadArguments("rate must be a positive number"));
        }
        let interval = Duration::try_from_secs_f64(1.0 / rate)
            .map_err(|_| crate::Error::BadArguments("rate is too small"))?;
        Ok(Self { interval, next: Mutex::new(None) })
    }

    /// Reserve the next slot and sleep until it is due. Never rejects.
    pub async fn wait(&self) {
        let due = {
            let mut next = self.next.lock();
            let now = Instant::now();
            let due = match *next {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next = Some(due + self.interval);
            due
        };
        tokio::time::sleep_until(due).await;
    }

    /// Take the next slot only if it is due right now.
    pub fn allow(&self) -> bool {
        let mut next = self.next.lock();
        let now = Instant::now();
        match *next {
            Some(slot) if slot > now => false,
            _ => {
                *next = Some(now + self.interval);
                true
            }
        }
    }
}

/// Fixed pool of `capacity` slots, acquired without waiting.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    capacity: usize,
    in_use: AtomicUsize,
}

impl ConcurrencyLimiter {
    /// `capacity` must be at least 1.
    pub fn new(capacity: usize) -> crate::Result<Self> {
        if capacity < 1 {
            return Err(crate::Error::BadArguments("concurrency limit must be at least 1"));
        }
        Ok(Self { capacity, in_use: AtomicUsize::new(0) })
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn in_use(&self) -> usize { self.in_use.load(Ordering::Acquire) }

    /// Reserve a slot, or return `false` at once if all are taken.
    pub fn acquire(&self) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < self.capacity).then_some(n + 1))
            .is_ok()
    }

    /// Free a slot. A no-op when nothing is held.
    pub fn release(&self) {
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Like [`acquire`](Self::acquire), releasing the slot when the permit drops.
    pub fn try_permit(self: &Arc<Self>) -> Option<ConcurrencyPermit> {
        self.acquire().then(|| ConcurrencyPermit { limiter: self.clone() })
    }
}

pub struct ConcurrencyPermit {
    limiter: Arc<ConcurrencyLimiter>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn three_waits_at_one_per_second_take_two_seconds() {
        let limiter = RateLimiter::new(1.0).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn allow_only_when_slot_is_due() {
        let limiter = RateLimiter::new(2.0).unwrap();
        assert!(limiter.allow());
        assert!(!limiter.allow());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters_are_spread_out() {
        let limiter = Arc::new(RateLimiter::new(10.0).unwrap());
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.wait().await;
                start.elapsed()
            }));
        }
        let mut elapsed = Vec::new();
        for h in handles {
            elapsed.push(h.await.unwrap());
        }
        elapsed.sort();
        assert!(elapsed[4] >= Duration::from_millis(400));
    }

    #[test]
    fn rejects_non_positive_rate() {
        assert!(RateLimiter::new(0.0).is_err());
        assert!(RateLimiter::new(-1.0).is_err());
        assert!(RateLimiter::new(f64::NAN).is_err());
        assert!(RateLimiter::new(f64::INFINITY).is_err());
    }

    #[test]
    fn rejects_rate_whose_interval_overflows() {
        assert!(matches!(RateLimiter::new(f64::MIN_POSITIVE), Err(crate::Error::BadArguments(_))));
        assert!(matches!(RateLimiter::new(1e-300), Err(crate::Error::BadArguments(_))));
        assert!(RateLimiter::new(1e-3).is_ok());
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(ConcurrencyLimiter::new(0), Err(crate::Error::BadArguments(_))));
    }

    #[test]
    fn acquire_beyond_capacity_fails() {
        let limiter = ConcurrencyLimiter::new(3).unwrap();
        let results: Vec<bool> = (0..5).map(|_| limiter.acquire()).collect();
        assert_eq!(results.iter().filter(|&&ok| ok).count(), 3);
        assert_eq!(results.iter().filter(|&&ok| !ok).count(), 2);

        limiter.release();
        limiter.release();
        assert!(limiter.acquire());
        assert!(limiter.acquire());
        assert!(!limiter.acquire());
    }

    #[test]
    fn concurrent_acquire_yields_exactly_capacity() {
        let limiter = Arc::new(ConcurrencyLimiter::new(4).unwrap());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.acquire())
            })
            .collect();
        let granted = handles.into_iter().map(|h| h.join().unwrap()).filter(|&ok| ok).count();
        assert_eq!(granted, 4);
        assert_eq!(limiter.in_use(), 4);
    }

    #[test]
    fn release_without_acquire_is_noop() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        limiter.release();
        assert_eq!(limiter.in_use(), 0);
        assert!(limiter.acquire());
        assert!(!limiter.acquire());
    }

    #[test]
    fn permit_releases_on_drop() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1).unwrap());
        let permit = limiter.try_permit();
        assert!(permit.is_some());
        assert!(limiter.try_permit().is_none());
        drop(permit);
        assert!(limiter.try_permit().is_some());
    }
}
