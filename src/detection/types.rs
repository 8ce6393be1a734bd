use serde::{Deserialize, Serialize};

use crate::detection::error::GeometryError;

/// 眼部轮廓固定为 6 个点
pub const EYE_CONTOUR_POINTS: usize = 6;

/// 每帧的眼睛睁开程度（EAR），无量纲
pub type OpennessScore = f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f64; 2]> for Point {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

/// 单眼 6 点轮廓
///
/// 点序约定：
/// - p0, p3: 左右眼角（水平方向）
/// - p1, p2: 上眼睑
/// - p4, p5: 下眼睑（p5 对 p1，p4 对 p2）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeContour {
    points: [Point; EYE_CONTOUR_POINTS],
}

impl EyeContour {
    pub fn new(points: [Point; EYE_CONTOUR_POINTS]) -> Self {
        Self { points }
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }
}

impl TryFrom<&[Point]> for EyeContour {
    type Error = GeometryError;

    fn try_from(value: &[Point]) -> Result<Self, Self::Error> {
        let points: [Point; EYE_CONTOUR_POINTS] =
            value.try_into().map_err(|_| GeometryError::PointCount {
                expected: EYE_CONTOUR_POINTS,
                actual: value.len(),
            })?;
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(GeometryError::NonFiniteCoordinate);
        }
        Ok(Self { points })
    }
}

impl TryFrom<&[[f64; 2]]> for EyeContour {
    type Error = GeometryError;

    fn try_from(value: &[[f64; 2]]) -> Result<Self, Self::Error> {
        let points: Vec<Point> = value.iter().copied().map(Point::from).collect();
        EyeContour::try_from(points.as_slice())
    }
}

/// 一张脸的左右眼轮廓
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceContours {
    pub left: EyeContour,
    pub right: EyeContour,
}

/// 窗口分类结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// 眨眼频率偏高
    Fatigue,
    /// 眨眼频率偏低
    OcularDeficiency,
    Normal,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fatigue => "fatigue",
            Self::OcularDeficiency => "ocular_deficiency",
            Self::Normal => "normal",
        }
    }

    /// 横幅提示文案
    pub fn alert_text(self) -> &'static str {
        match self {
            Self::Fatigue => "Fatigue detected: high blink rate in the last window.",
            Self::OcularDeficiency => "Eye problem detected: low blink rate in the last window.",
            Self::Normal => "Good health. Enjoy your day.",
        }
    }

    /// 语音播报文案，由客户端合成
    pub fn speech_text(self) -> &'static str {
        match self {
            Self::Fatigue => "Fatigue detected. Please take a break.",
            Self::OcularDeficiency => "Possible eye problem detected. Please consult a doctor.",
            Self::Normal => "Good health. Please continue working.",
        }
    }
}
