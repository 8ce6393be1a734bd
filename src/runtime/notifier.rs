use std::sync::Arc;

use crate::detection::notifier::{Notifier, VerdictNotice};
use crate::store::operations::verdicts::VerdictRecord;
use crate::store::Store;

/// 把窗口结论写入 verdicts 树并打日志。写库在阻塞线程池里进行，
/// 失败只记录，不影响帧处理
pub struct StoreNotifier {
    store: Arc<Store>,
    user_id: String,
}

impl StoreNotifier {
    pub fn new(store: Arc<Store>, user_id: &str) -> Self {
        Self {
            store,
            user_id: user_id.to_string(),
        }
    }
}

impl Notifier for StoreNotifier {
    fn notify(&self, notice: &VerdictNotice) {
        tracing::info!(
            session_id = %notice.session_id,
            verdict = notice.verdict.as_str(),
            alert = notice.alert,
            "Eye health alert"
        );

        let record = VerdictRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id.clone(),
            session_id: notice.session_id.clone(),
            verdict: notice.verdict,
            window_blinks: notice.window_blinks,
            total_blinks: notice.total_blinks,
            created_at: notice.at,
        };
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || persist(&store, &record));
    }
}

fn persist(store: &Store, record: &VerdictRecord) {
    if let Err(e) = store.record_verdict(record) {
        tracing::warn!(
            session_id = %record.session_id,
            error = %e,
            "Failed to persist verdict"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::detection::Verdict;

    #[tokio::test]
    async fn notice_is_persisted_for_user() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("n-db").to_str().unwrap()).unwrap());
        let notifier = StoreNotifier::new(store.clone(), "u1");

        // notify 立即返回，写库在后台完成
        notifier.notify(&VerdictNotice::new("s1", Verdict::Fatigue, 5, 12));

        let mut listed = store.list_user_verdicts("u1", 10, 0).unwrap();
        for _ in 0..100 {
            if listed.1 > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            listed = store.list_user_verdicts("u1", 10, 0).unwrap();
        }
        let (items, total) = listed;
        assert_eq!(total, 1);
        assert_eq!(items[0].verdict, Verdict::Fatigue);
        assert_eq!(items[0].session_id, "s1");
        assert_eq!(items[0].window_blinks, 5);
    }
}
