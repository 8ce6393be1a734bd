use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// 眼角水平距离为 0，无法计算纵横比
    #[error("degenerate eye contour: horizontal width is zero")]
    DegenerateContour,
    #[error("expected {expected} landmark points, got {actual}")]
    PointCount { expected: usize, actual: usize },
    #[error("landmark coordinates must be finite")]
    NonFiniteCoordinate,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("earThreshold must be in [{min}, {max}], got {value}")]
    EarThreshold { value: f64, min: f64, max: f64 },
    #[error("minConsecutiveFrames must be in [{min}, {max}], got {value}")]
    MinConsecutiveFrames { value: u32, min: u32, max: u32 },
    #[error("windowDurationSeconds must be in [{min}, {max}], got {value}")]
    WindowDuration { value: u64, min: u64, max: u64 },
    #[error("blinkHighThreshold must be in [{min}, {max}], got {value}")]
    BlinkHighThreshold { value: u32, min: u32, max: u32 },
}
