use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 单调时钟，窗口计时只依赖它
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// 基于 tokio 时钟，测试中可用暂停时间推进
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// 手动推进的时钟
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_shared_handle() {
        let start = Instant::now();
        let clock = ManualClock::new(start);
        let other = clock.clone();
        clock.advance(Duration::from_secs(3));
        assert_eq!(other.now(), start + Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_paused_time() {
        let clock = MonotonicClock;
        let before = clock.now();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(clock.now().duration_since(before) >= Duration::from_secs(10));
    }
}
