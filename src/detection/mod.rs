//! 基于眼部关键点的眨眼检测与眼部健康分类
//!
//! - `ear`: 6 点 EAR 计算，双眼平均
//! - `blink`: 眨眼状态机
//! - `classifier`: 固定窗口眨眼频率分类
//! - `monitor`: 单会话核心状态
//! - `pipeline`: 帧队列消费者

pub mod blink;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod control;
pub mod ear;
pub mod error;
pub mod landmarks;
pub mod monitor;
pub mod notifier;
pub mod pipeline;
pub mod types;

pub use blink::BlinkDetector;
pub use classifier::{classify, WindowedClassifier};
pub use config::DetectionConfig;
pub use ear::compute_openness;
pub use error::{ConfigurationError, GeometryError};
pub use monitor::EyeHealthMonitor;
pub use types::{EyeContour, Verdict};
