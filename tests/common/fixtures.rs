use serde_json::{json, Value};

/// 宽 30、开合高度 `2 * half_height` 的 6 点眼轮廓，EAR = 2 * half_height / 30
pub fn eye(x0: f64, half_height: f64) -> Vec<[f64; 2]> {
    vec![
        [x0, 0.0],
        [x0 + 10.0, half_height],
        [x0 + 20.0, half_height],
        [x0 + 30.0, 0.0],
        [x0 + 20.0, -half_height],
        [x0 + 10.0, -half_height],
    ]
}

/// 给定目标 EAR 的单人脸帧
pub fn frame_with_ear(ear: f64) -> Value {
    let half = ear * 30.0 / 2.0;
    json!({
        "faces": [{ "leftEye": eye(100.0, half), "rightEye": eye(0.0, half) }]
    })
}

pub fn open_frame() -> Value {
    frame_with_ear(0.30)
}

pub fn closed_frame() -> Value {
    frame_with_ear(0.10)
}

pub fn empty_frame() -> Value {
    json!({ "faces": [] })
}

/// 68 点整脸形状，眼部点按给定 EAR 放置，其余点落在远处
pub fn shape_frame(ear: f64) -> Value {
    let half = ear * 30.0 / 2.0;
    let mut points: Vec<[f64; 2]> = (0..68).map(|i| [500.0 + i as f64, 500.0]).collect();
    for (i, p) in eye(0.0, half).into_iter().enumerate() {
        points[36 + i] = p;
    }
    for (i, p) in eye(100.0, half).into_iter().enumerate() {
        points[42 + i] = p;
    }
    json!({ "faces": [{ "landmarks": points }] })
}

/// 一次完整眨眼：3 帧闭眼后睁开
pub fn blink_sequence() -> Vec<Value> {
    vec![closed_frame(), closed_frame(), closed_frame(), open_frame()]
}
