use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::detection::types::Verdict;

/// 一次窗口评估后发出的通知
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictNotice {
    pub session_id: String,
    pub verdict: Verdict,
    pub window_blinks: u32,
    pub total_blinks: u64,
    pub alert: &'static str,
    pub speech: &'static str,
    pub at: DateTime<Utc>,
}

impl VerdictNotice {
    pub fn new(session_id: &str, verdict: Verdict, window_blinks: u32, total_blinks: u64) -> Self {
        Self {
            session_id: session_id.to_string(),
            verdict,
            window_blinks,
            total_blinks,
            alert: verdict.alert_text(),
            speech: verdict.speech_text(),
            at: Utc::now(),
        }
    }
}

/// 结论通知出口。实现不得长时间阻塞帧处理，耗时工作应自行异步化。
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notice: &VerdictNotice);
}
