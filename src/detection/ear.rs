//! EAR (Eye Aspect Ratio) 计算
//!
//! 标准 6 点公式: EAR = (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)

use crate::detection::error::GeometryError;
use crate::detection::types::{EyeContour, FaceContours, OpennessScore};

/// 低于此水平宽度视为退化轮廓
const MIN_HORIZONTAL_WIDTH: f64 = 1e-9;

pub fn compute_openness(eye: &EyeContour) -> Result<OpennessScore, GeometryError> {
    let horizontal = eye.point(0).distance(&eye.point(3));
    if !horizontal.is_finite() || horizontal < MIN_HORIZONTAL_WIDTH {
        return Err(GeometryError::DegenerateContour);
    }

    let vertical1 = eye.point(1).distance(&eye.point(5));
    let vertical2 = eye.point(2).distance(&eye.point(4));

    Ok((vertical1 + vertical2) / (2.0 * horizontal))
}

/// 双眼 EAR 结果；退化的一侧为 `None`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinocularOpenness {
    pub left: Option<OpennessScore>,
    pub right: Option<OpennessScore>,
}

impl BinocularOpenness {
    /// 左右眼算术平均；只有一侧可用时直接使用该侧，两侧都不可用时无样本
    pub fn combined(&self) -> Option<OpennessScore> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }
}

pub fn binocular_openness(face: &FaceContours) -> BinocularOpenness {
    let side = |eye: &EyeContour, name: &'static str| match compute_openness(eye) {
        Ok(ear) => Some(ear),
        Err(e) => {
            tracing::debug!(eye = name, error = %e, "Skipping eye contour");
            None
        }
    };

    BinocularOpenness {
        left: side(&face.left, "left"),
        right: side(&face.right, "right"),
    }
}
