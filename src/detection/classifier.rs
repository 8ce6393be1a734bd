//! 固定窗口眨眼频率分类
//!
//! 窗口时长到期后根据窗口内眨眼次数给出结论，然后清零并从当前时刻开始新窗口。
//! 只有恰好等于阈值时才是 Normal。

use std::time::{Duration, Instant};

use crate::detection::types::Verdict;

pub fn classify(window_blinks: u32, blink_high_threshold: u32) -> Verdict {
    if window_blinks > blink_high_threshold {
        Verdict::Fatigue
    } else if window_blinks < blink_high_threshold {
        Verdict::OcularDeficiency
    } else {
        Verdict::Normal
    }
}

/// 一次窗口评估的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    pub verdict: Verdict,
    pub window_blinks: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct WindowedClassifier {
    window: Duration,
    blink_high_threshold: u32,
    window_start: Instant,
    window_blinks: u32,
}

impl WindowedClassifier {
    pub fn new(window: Duration, blink_high_threshold: u32, started_at: Instant) -> Self {
        Self {
            window,
            blink_high_threshold,
            window_start: started_at,
            window_blinks: 0,
        }
    }

    pub fn record_blink(&mut self) {
        self.window_blinks = self.window_blinks.saturating_add(1);
    }

    /// 窗口未到期时返回 `None`；到期时返回结论并重置窗口
    pub fn maybe_classify(&mut self, now: Instant) -> Option<WindowOutcome> {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let window_blinks = self.window_blinks;
        let verdict = classify(window_blinks, self.blink_high_threshold);
        self.window_blinks = 0;
        self.window_start = now;

        Some(WindowOutcome {
            verdict,
            window_blinks,
            elapsed,
        })
    }

    pub fn window_blinks(&self) -> u32 {
        self.window_blinks
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_around_threshold() {
        assert_eq!(classify(4, 3), Verdict::Fatigue);
        assert_eq!(classify(2, 3), Verdict::OcularDeficiency);
        assert_eq!(classify(3, 3), Verdict::Normal);
        assert_eq!(classify(0, 3), Verdict::OcularDeficiency);
    }

    #[test]
    fn no_verdict_before_window_elapses() {
        let start = Instant::now();
        let mut c = WindowedClassifier::new(Duration::from_secs(10), 3, start);
        c.record_blink();
        assert!(c.maybe_classify(start + Duration::from_millis(9_999)).is_none());
        assert_eq!(c.window_blinks(), 1);
    }

    #[test]
    fn verdict_at_window_boundary_resets_counter() {
        let start = Instant::now();
        let mut c = WindowedClassifier::new(Duration::from_secs(10), 3, start);
        for _ in 0..4 {
            c.record_blink();
        }
        let now = start + Duration::from_secs(10);
        let outcome = c.maybe_classify(now).unwrap();
        assert_eq!(outcome.verdict, Verdict::Fatigue);
        assert_eq!(outcome.window_blinks, 4);
        assert_eq!(c.window_blinks(), 0);
        assert_eq!(c.window_start(), now);
    }

    #[test]
    fn same_instant_classifies_once() {
        let start = Instant::now();
        let mut c = WindowedClassifier::new(Duration::from_secs(10), 3, start);
        let now = start + Duration::from_secs(12);
        assert!(c.maybe_classify(now).is_some());
        assert!(c.maybe_classify(now).is_none());
    }

    #[test]
    fn windows_do_not_overlap() {
        let start = Instant::now();
        let mut c = WindowedClassifier::new(Duration::from_secs(10), 3, start);
        // 第一次在 12s 评估，下一个窗口从 12s 开始，到 22s 才到期
        assert!(c.maybe_classify(start + Duration::from_secs(12)).is_some());
        assert!(c.maybe_classify(start + Duration::from_secs(21)).is_none());
        assert!(c.maybe_classify(start + Duration::from_secs(22)).is_some());
    }

    #[test]
    fn clock_going_backwards_is_not_elapsed() {
        let start = Instant::now() + Duration::from_secs(60);
        let mut c = WindowedClassifier::new(Duration::from_secs(10), 3, start);
        assert!(c.maybe_classify(start - Duration::from_secs(30)).is_none());
    }
}
