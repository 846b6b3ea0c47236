use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Window {
    count: u32,
    started: Instant,
}

/// Fixed-window request counter keyed by `(route class, client address)`.
/// Bounds abusive repeated submissions on the public intake routes.
#[derive(Default)]
pub(crate) struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub(crate) async fn allow(
        &self,
        route: &str,
        client: &str,
        max_requests: u32,
        window: Duration,
    ) -> bool {
        let key = format!("{route}:{client}");
        let now = Instant::now();
        let mut lock = self.windows.lock().await;
        // prune-on-access; otherwise one entry per client address lives forever
        lock.retain(|_, w| now.duration_since(w.started) <= window);
        let entry = lock.entry(key).or_insert_with(|| Window {
            count: 0,
            started: now,
        });
        if now.duration_since(entry.started) > window {
            entry.count = 0;
            entry.started = now;
        }
        if entry.count >= max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn budget_is_enforced_within_one_window() {
        let limiter = RateLimiter::default();
        let window = Duration::from_secs(60);
        for _ in 0..3 {
            assert!(limiter.allow("order", "1.2.3.4", 3, window).await);
        }
        assert!(!limiter.allow("order", "1.2.3.4", 3, window).await);
    }

    #[tokio::test]
    async fn budgets_are_scoped_per_route_and_client() {
        let limiter = RateLimiter::default();
        let window = Duration::from_secs(60);
        assert!(limiter.allow("order", "1.2.3.4", 1, window).await);
        assert!(!limiter.allow("order", "1.2.3.4", 1, window).await);
        assert!(limiter.allow("order_product", "1.2.3.4", 1, window).await);
        assert!(limiter.allow("order", "5.6.7.8", 1, window).await);
    }

    #[tokio::test]
    async fn expired_windows_are_evicted_not_kept_forever() {
        let limiter = RateLimiter::default();
        let window = Duration::from_millis(20);
        for client in ["1.1.1.1", "2.2.2.2", "3.3.3.3"] {
            assert!(limiter.allow("order", client, 5, window).await);
        }
        assert_eq!(limiter.windows.lock().await.len(), 3);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.allow("order", "4.4.4.4", 5, window).await);
        assert_eq!(limiter.windows.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = RateLimiter::default();
        let window = Duration::from_millis(20);
        assert!(limiter.allow("order", "1.2.3.4", 1, window).await);
        assert!(!limiter.allow("order", "1.2.3.4", 1, window).await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.allow("order", "1.2.3.4", 1, window).await);
    }
}
