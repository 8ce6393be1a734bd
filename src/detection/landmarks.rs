//! 人脸关键点输入
//!
//! 关键点检测模型在客户端运行，服务端只接收检测结果。每张脸可以直接给出
//! 左右眼 6 点轮廓，也可以给出 iBUG-300W 约定的完整 68 点人脸形状。

use std::ops::Range;

use serde::Deserialize;

use crate::detection::error::GeometryError;
use crate::detection::types::{EyeContour, FaceContours};

pub const FACE_SHAPE_POINTS: usize = 68;
/// 68 点形状中的右眼（图像左侧）
pub const RIGHT_EYE_RANGE: Range<usize> = 36..42;
/// 68 点形状中的左眼（图像右侧）
pub const LEFT_EYE_RANGE: Range<usize> = 42..48;

/// 从一帧中取出每张脸的双眼轮廓
pub trait LandmarkProvider: Send + Sync + 'static {
    type Frame: Send + 'static;

    fn detect_eye_contours(&self, frame: &Self::Frame) -> Vec<FaceContours>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FaceLandmarks {
    Eyes {
        #[serde(rename = "leftEye")]
        left_eye: Vec<[f64; 2]>,
        #[serde(rename = "rightEye")]
        right_eye: Vec<[f64; 2]>,
    },
    Shape {
        landmarks: Vec<[f64; 2]>,
    },
}

impl FaceLandmarks {
    pub fn to_contours(&self) -> Result<FaceContours, GeometryError> {
        match self {
            Self::Eyes {
                left_eye,
                right_eye,
            } => Ok(FaceContours {
                left: EyeContour::try_from(left_eye.as_slice())?,
                right: EyeContour::try_from(right_eye.as_slice())?,
            }),
            Self::Shape { landmarks } => {
                if landmarks.len() != FACE_SHAPE_POINTS {
                    return Err(GeometryError::PointCount {
                        expected: FACE_SHAPE_POINTS,
                        actual: landmarks.len(),
                    });
                }
                Ok(FaceContours {
                    left: EyeContour::try_from(&landmarks[LEFT_EYE_RANGE])?,
                    right: EyeContour::try_from(&landmarks[RIGHT_EYE_RANGE])?,
                })
            }
        }
    }
}

/// 客户端上报的一帧关键点
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkFrame {
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,
}

/// 校验后的帧，只保留第一张脸的双眼轮廓
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContourFrame {
    pub faces: Vec<FaceContours>,
}

impl TryFrom<&LandmarkFrame> for ContourFrame {
    type Error = GeometryError;

    fn try_from(value: &LandmarkFrame) -> Result<Self, Self::Error> {
        // 只处理第一张脸，其余的脸不校验
        let first = value.faces.first().map(FaceLandmarks::to_contours).transpose()?;
        Ok(Self {
            faces: first.into_iter().collect(),
        })
    }
}

/// 上报的帧里已经是轮廓，直接透传
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedLandmarks;

impl LandmarkProvider for ReportedLandmarks {
    type Frame = ContourFrame;

    fn detect_eye_contours(&self, frame: &Self::Frame) -> Vec<FaceContours> {
        frame.faces.clone()
    }
}
