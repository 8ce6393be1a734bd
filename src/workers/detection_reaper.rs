use std::time::Duration;

use crate::runtime::SessionRegistry;

/// 停止长时间没有帧的检测会话，客户端断开后会话不会一直占着名额
pub async fn run(registry: &SessionRegistry, idle_timeout: Duration) {
    tracing::debug!("detection_reaper: start");
    let reaped = registry.reap_idle(idle_timeout).await;
    if reaped.is_empty() {
        tracing::debug!("detection_reaper: nothing to reap");
    } else {
        tracing::info!(reaped = reaped.len(), "detection_reaper: done");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::DetectionEnvConfig;
    use crate::detection::DetectionConfig;
    use crate::store::operations::detection_sessions::DetectionStatus;
    use crate::store::Store;

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_stopped_and_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(tmp.path().join("reaper.sled").to_str().unwrap()).unwrap());
        let registry = SessionRegistry::new(store.clone(), DetectionEnvConfig::default());
        let record = registry.start("u1", DetectionConfig::default()).await.unwrap();

        run(&registry, Duration::from_secs(60)).await;
        assert_eq!(registry.active_count().await, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        run(&registry, Duration::from_secs(60)).await;
        assert_eq!(registry.active_count().await, 0);

        let stored = store.get_detection_session(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, DetectionStatus::Stopped);
    }
}
