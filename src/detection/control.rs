use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 会话启停标志，由外部设置，处理循环每帧开头检查一次
#[derive(Debug, Clone)]
pub struct SessionControl {
    running: Arc<AtomicBool>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 返回调用前是否仍在运行
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}
