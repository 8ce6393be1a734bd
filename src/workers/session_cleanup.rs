use chrono::Utc;

use crate::store::Store;

/// 删除已过期的登录会话
pub async fn run(store: &Store) {
    match store.cleanup_expired_sessions(Utc::now()) {
        Ok(0) => tracing::debug!("session_cleanup: nothing expired"),
        Ok(count) => tracing::info!(cleaned = count, "session_cleanup: done"),
        Err(e) => tracing::error!(error = %e, "session_cleanup failed"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::operations::sessions::AuthSession;

    #[tokio::test]
    async fn expired_sessions_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path().join("cleanup.sled").to_str().unwrap()).unwrap();
        let issued_at = Utc::now() - Duration::hours(2);
        store
            .create_session(&AuthSession::new(
                "u1",
                "expired",
                issued_at,
                issued_at + Duration::hours(1),
            ))
            .unwrap();

        run(&store).await;
        assert_eq!(store.count_user_sessions("u1").unwrap(), 0);
    }
}
