use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window limiter: at most `max_hits` accepted calls per key within
/// any `window`.
///
/// Each key keeps the instants of its accepted hits; stale instants are
/// pruned lazily on the next check for that key, and keys whose list becomes
/// empty are dropped. State lives for the lifetime of the instance only.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    max_hits: usize,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(max_hits: usize, window: Duration) -> Self {
        Self {
            max_hits,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records a hit for `key` if it is under quota. Returns whether it was
    /// accepted.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock.
    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());

        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|t| now.saturating_duration_since(*t) < self.window);

        if entry.len() >= self.max_hits {
            tracing::debug!(
                "Rate limit reached for key: {} ({} hits in window)",
                key,
                entry.len()
            );
            return false;
        }

        entry.push(now);
        true
    }

    /// Hits still counted for `key` at `now`.
    pub fn hits_in_window(&self, key: &str, now: Instant) -> usize {
        let hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.get(key)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drops every key with no hit inside the window.
    pub fn prune(&self, now: Instant) {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.retain(|_, entry| {
            entry.retain(|t| now.saturating_duration_since(*t) < self.window);
            !entry.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(600);

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = SlidingWindowRateLimiter::new(10, WINDOW);
        let now = Instant::now();

        for i in 0..10 {
            assert!(limiter.check_at("203.0.113.7", now), "hit {} rejected", i);
        }
        assert!(!limiter.check_at("203.0.113.7", now));
        assert_eq!(limiter.hits_in_window("203.0.113.7", now), 10);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = SlidingWindowRateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
    }

    #[test]
    fn test_window_slides() {
        let limiter = SlidingWindowRateLimiter::new(2, WINDOW);
        let start = Instant::now();

        assert!(limiter.check_at("k", start));
        assert!(limiter.check_at("k", start + Duration::from_secs(300)));
        assert!(!limiter.check_at("k", start + Duration::from_secs(599)));
        // First hit leaves the window at exactly 600s.
        assert!(limiter.check_at("k", start + Duration::from_secs(600)));
        assert!(!limiter.check_at("k", start + Duration::from_secs(601)));
    }

    #[test]
    fn test_rejected_hits_are_not_recorded() {
        let limiter = SlidingWindowRateLimiter::new(1, WINDOW);
        let start = Instant::now();

        assert!(limiter.check_at("k", start));
        for s in 1..10 {
            assert!(!limiter.check_at("k", start + Duration::from_secs(s)));
        }
        assert!(limiter.check_at("k", start + WINDOW));
    }

    #[test]
    fn test_prune_drops_idle_keys() {
        let limiter = SlidingWindowRateLimiter::new(5, WINDOW);
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("new", start + Duration::from_secs(500));

        limiter.prune(start + Duration::from_secs(700));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_limit() {
        let limiter = Arc::new(SlidingWindowRateLimiter::new(10, WINDOW));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || (0..5).filter(|_| limiter.check_at("shared", now)).count())
            })
            .collect();

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 10);
    }
}
