use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::error::ConfigurationError;

pub const EAR_THRESHOLD_RANGE: RangeInclusive<f64> = 0.15..=0.30;
pub const MIN_CONSECUTIVE_FRAMES_RANGE: RangeInclusive<u32> = 2..=10;
pub const WINDOW_DURATION_SECS_RANGE: RangeInclusive<u64> = 1..=3_600;
pub const BLINK_HIGH_THRESHOLD_RANGE: RangeInclusive<u32> = 1..=1_000;

pub const DEFAULT_EAR_THRESHOLD: f64 = 0.21;
pub const DEFAULT_MIN_CONSECUTIVE_FRAMES: u32 = 3;
pub const DEFAULT_WINDOW_DURATION_SECS: u64 = 10;
pub const DEFAULT_BLINK_HIGH_THRESHOLD: u32 = 3;

/// 单个检测会话的参数，会话启动前必须通过 [`DetectionConfig::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    pub ear_threshold: f64,
    pub min_consecutive_frames: u32,
    pub window_duration_seconds: u64,
    pub blink_high_threshold: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            min_consecutive_frames: DEFAULT_MIN_CONSECUTIVE_FRAMES,
            window_duration_seconds: DEFAULT_WINDOW_DURATION_SECS,
            blink_high_threshold: DEFAULT_BLINK_HIGH_THRESHOLD,
        }
    }
}

/// 客户端可覆盖的部分参数
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOverrides {
    pub ear_threshold: Option<f64>,
    pub min_consecutive_frames: Option<u32>,
    pub window_duration_seconds: Option<u64>,
    pub blink_high_threshold: Option<u32>,
}

impl DetectionConfig {
    /// 超出范围直接报错，不做截断
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        // NaN 不落在任何区间内
        if !EAR_THRESHOLD_RANGE.contains(&self.ear_threshold) {
            return Err(ConfigurationError::EarThreshold {
                value: self.ear_threshold,
                min: *EAR_THRESHOLD_RANGE.start(),
                max: *EAR_THRESHOLD_RANGE.end(),
            });
        }
        if !MIN_CONSECUTIVE_FRAMES_RANGE.contains(&self.min_consecutive_frames) {
            return Err(ConfigurationError::MinConsecutiveFrames {
                value: self.min_consecutive_frames,
                min: *MIN_CONSECUTIVE_FRAMES_RANGE.start(),
                max: *MIN_CONSECUTIVE_FRAMES_RANGE.end(),
            });
        }
        if !WINDOW_DURATION_SECS_RANGE.contains(&self.window_duration_seconds) {
            return Err(ConfigurationError::WindowDuration {
                value: self.window_duration_seconds,
                min: *WINDOW_DURATION_SECS_RANGE.start(),
                max: *WINDOW_DURATION_SECS_RANGE.end(),
            });
        }
        if !BLINK_HIGH_THRESHOLD_RANGE.contains(&self.blink_high_threshold) {
            return Err(ConfigurationError::BlinkHighThreshold {
                value: self.blink_high_threshold,
                min: *BLINK_HIGH_THRESHOLD_RANGE.start(),
                max: *BLINK_HIGH_THRESHOLD_RANGE.end(),
            });
        }
        Ok(())
    }

    pub fn with_overrides(&self, overrides: &DetectionOverrides) -> Self {
        Self {
            ear_threshold: overrides.ear_threshold.unwrap_or(self.ear_threshold),
            min_consecutive_frames: overrides
                .min_consecutive_frames
                .unwrap_or(self.min_consecutive_frames),
            window_duration_seconds: overrides
                .window_duration_seconds
                .unwrap_or(self.window_duration_seconds),
            blink_high_threshold: overrides
                .blink_high_threshold
                .unwrap_or(self.blink_high_threshold),
        }
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_duration_seconds)
    }
}
