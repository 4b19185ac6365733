//! Per-domain politeness: bounded concurrency plus a minimum delay between
//! request starts. Unrelated domains never wait on each other.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

struct DomainSlot {
    semaphore: Arc<Semaphore>,
    next_start: Mutex<Instant>,
    requests: AtomicUsize,
}

pub struct DomainRateLimiter {
    domains: DashMap<String, Arc<DomainSlot>>,
    parallelism: usize,
    min_delay: Duration,
}

impl DomainRateLimiter {
    pub fn new(parallelism: usize, min_delay: Duration) -> Self {
        Self {
            domains: DashMap::new(),
            parallelism: parallelism.max(1),
            min_delay,
        }
    }

    fn slot(&self, domain: &str) -> Arc<DomainSlot> {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| {
                Arc::new(DomainSlot {
                    semaphore: Arc::new(Semaphore::new(self.parallelism)),
                    next_start: Mutex::new(Instant::now()),
                    requests: AtomicUsize::new(0),
                })
            })
            .clone()
    }

    /// Wait for a free slot on `domain`, then for its delay window.
    pub async fn acquire(&self, domain: &str) -> Result<DomainPermit, AcquireError> {
        let slot = self.slot(domain);
        let permit = slot.semaphore.clone().acquire_owned().await?;

        // Reserve a start time under the lock, sleep outside it
        let start = {
            let mut next = slot
                .next_start
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let start = (*next).max(Instant::now());
            *next = start + self.min_delay;
            start
        };
        if start > Instant::now() {
            tokio::time::sleep_until(start).await;
        }

        slot.requests.fetch_add(1, Ordering::Relaxed);
        Ok(DomainPermit { _permit: permit })
    }

    /// Requests started against `domain` so far.
    pub fn requests_for(&self, domain: &str) -> usize {
        self.domains
            .get(domain)
            .map(|slot| slot.requests.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

/// Releases the domain slot when dropped.
#[derive(Debug)]
pub struct DomainPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_same_domain_requests() {
        let limiter = DomainRateLimiter::new(2, Duration::from_secs(1));
        let begin = Instant::now();

        let _a = limiter.acquire("imob.com.br").await.unwrap();
        let _b = limiter.acquire("imob.com.br").await.unwrap();

        assert!(begin.elapsed() >= Duration::from_secs(1));
        assert_eq!(limiter.requests_for("imob.com.br"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_domains_are_independent() {
        let limiter = DomainRateLimiter::new(1, Duration::from_secs(2));
        let begin = Instant::now();

        let _a = limiter.acquire("a.com.br").await.unwrap();
        let _b = limiter.acquire("b.com.br").await.unwrap();

        assert!(begin.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_parallelism_bound() {
        let limiter = DomainRateLimiter::new(1, Duration::ZERO);
        let held = limiter.acquire("imob.com.br").await.unwrap();

        let mut waiter = task::spawn(limiter.acquire("imob.com.br"));
        assert_pending!(waiter.poll());

        drop(held);
        assert!(waiter.is_woken());
        assert_ready!(waiter.poll()).unwrap();
    }
}
