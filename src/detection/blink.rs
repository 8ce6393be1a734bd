//! 眨眼检测状态机
//!
//! EAR 连续低于阈值的帧数达到下限后，在眼睛重新睁开的那一帧记一次眨眼。
//! 一直未睁开的闭眼不计数。

use serde::Serialize;

use crate::detection::types::OpennessScore;

/// 窗口内的眨眼计数见 `WindowedClassifier::window_blinks`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorState {
    pub consecutive_low_frames: u32,
    pub total_blinks: u64,
}

#[derive(Debug, Clone)]
pub struct BlinkDetector {
    ear_threshold: f64,
    min_consecutive_frames: u32,
    state: DetectorState,
}

impl BlinkDetector {
    pub fn new(ear_threshold: f64, min_consecutive_frames: u32) -> Self {
        Self {
            ear_threshold,
            min_consecutive_frames,
            state: DetectorState::default(),
        }
    }

    /// 处理一帧，返回本帧是否记录了一次眨眼
    pub fn process_frame(&mut self, ear: OpennessScore) -> bool {
        if ear < self.ear_threshold {
            self.state.consecutive_low_frames = self.state.consecutive_low_frames.saturating_add(1);
            return false;
        }

        let registered = self.state.consecutive_low_frames >= self.min_consecutive_frames;
        if registered {
            self.state.total_blinks += 1;
        }
        self.state.consecutive_low_frames = 0;
        registered
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn total_blinks(&self) -> u64 {
        self.state.total_blinks
    }

    pub fn consecutive_low_frames(&self) -> u32 {
        self.state.consecutive_low_frames
    }
}
