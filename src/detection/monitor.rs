use std::time::Instant;

use serde::Serialize;

use crate::detection::blink::BlinkDetector;
use crate::detection::classifier::{WindowOutcome, WindowedClassifier};
use crate::detection::config::DetectionConfig;
use crate::detection::ear::binocular_openness;
use crate::detection::types::{FaceContours, OpennessScore};

/// 单帧处理结果
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSample {
    pub face_detected: bool,
    pub ear: Option<OpennessScore>,
    pub blink_registered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub consecutive_low_frames: u32,
    pub total_blinks: u64,
    pub window_blinks: u32,
}

/// 一个检测会话独占的核心状态：眨眼状态机 + 分类窗口
#[derive(Debug, Clone)]
pub struct EyeHealthMonitor {
    detector: BlinkDetector,
    classifier: WindowedClassifier,
}

impl EyeHealthMonitor {
    pub fn new(config: &DetectionConfig, started_at: Instant) -> Self {
        Self {
            detector: BlinkDetector::new(config.ear_threshold, config.min_consecutive_frames),
            classifier: WindowedClassifier::new(
                config.window_duration(),
                config.blink_high_threshold,
                started_at,
            ),
        }
    }

    pub fn process_frame(&mut self, ear: OpennessScore) -> bool {
        let registered = self.detector.process_frame(ear);
        if registered {
            self.classifier.record_blink();
        }
        registered
    }

    /// 取第一张脸的双眼 EAR 喂给状态机；无脸或双眼均退化时状态不变
    pub fn process_faces(&mut self, faces: &[FaceContours]) -> FrameSample {
        let Some(face) = faces.first() else {
            return FrameSample::default();
        };

        let ear = binocular_openness(face).combined();
        let blink_registered = ear.map(|v| self.process_frame(v)).unwrap_or(false);

        FrameSample {
            face_detected: true,
            ear,
            blink_registered,
        }
    }

    pub fn maybe_classify(&mut self, now: Instant) -> Option<WindowOutcome> {
        self.classifier.maybe_classify(now)
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            consecutive_low_frames: self.detector.consecutive_low_frames(),
            total_blinks: self.detector.total_blinks(),
            window_blinks: self.classifier.window_blinks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::detection::types::{EyeContour, Point, Verdict};

    fn eye(lid_gap: f64) -> EyeContour {
        let h = lid_gap / 2.0;
        EyeContour::new([
            Point::new(0.0, 0.0),
            Point::new(10.0, h),
            Point::new(20.0, h),
            Point::new(30.0, 0.0),
            Point::new(20.0, -h),
            Point::new(10.0, -h),
        ])
    }

    fn face(lid_gap: f64) -> FaceContours {
        FaceContours {
            left: eye(lid_gap),
            right: eye(lid_gap),
        }
    }

    #[test]
    fn blink_increments_lifetime_and_window_counts() {
        let start = Instant::now();
        let mut m = EyeHealthMonitor::new(&DetectionConfig::default(), start);
        for ear in [0.25, 0.10, 0.10, 0.10, 0.25] {
            m.process_frame(ear);
        }
        let snap = m.snapshot();
        assert_eq!(snap.total_blinks, 1);
        assert_eq!(snap.window_blinks, 1);
    }

    #[test]
    fn window_reset_keeps_lifetime_total() {
        let start = Instant::now();
        let mut m = EyeHealthMonitor::new(&DetectionConfig::default(), start);
        for ear in [0.1, 0.1, 0.1, 0.3] {
            m.process_frame(ear);
        }
        let outcome = m.maybe_classify(start + Duration::from_secs(10)).unwrap();
        assert_eq!(outcome.verdict, Verdict::OcularDeficiency);
        let snap = m.snapshot();
        assert_eq!(snap.window_blinks, 0);
        assert_eq!(snap.total_blinks, 1);
    }

    #[test]
    fn no_face_is_a_noop() {
        let mut m = EyeHealthMonitor::new(&DetectionConfig::default(), Instant::now());
        m.process_frame(0.1);
        let sample = m.process_faces(&[]);
        assert!(!sample.face_detected);
        assert_eq!(m.snapshot().consecutive_low_frames, 1);
    }

    #[test]
    fn only_first_face_is_used() {
        let mut m = EyeHealthMonitor::new(&DetectionConfig::default(), Instant::now());
        // 第一张脸睁眼，第二张闭眼
        let sample = m.process_faces(&[face(9.0), face(0.0)]);
        assert!((sample.ear.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(m.snapshot().consecutive_low_frames, 0);
    }

    #[test]
    fn degenerate_face_leaves_state_unchanged() {
        let mut m = EyeHealthMonitor::new(&DetectionConfig::default(), Instant::now());
        m.process_frame(0.1);
        let flat = EyeContour::new([Point::new(3.0, 3.0); 6]);
        let sample = m.process_faces(&[FaceContours {
            left: flat,
            right: flat,
        }]);
        assert!(sample.face_detected);
        assert!(sample.ear.is_none());
        assert_eq!(m.snapshot().consecutive_low_frames, 1);
    }
}
