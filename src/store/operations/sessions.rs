use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{map_tx_error, Store, StoreError};

/// 过期清理每轮最多删除的会话数
const EXPIRED_BATCH: usize = 1_000;

/// 登录会话，主键是令牌摘要；登出即删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token_hash: String,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(
        user_id: &str,
        token_hash: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_hash: token_hash.to_string(),
            user_id: user_id.to_string(),
            issued_at,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// 用户索引的值是签发时间（毫秒，大端），淘汰最旧会话时不必读主记录
fn issued_at_bytes(session: &AuthSession) -> [u8; 8] {
    session.issued_at.timestamp_millis().to_be_bytes()
}

fn issued_at_from_bytes(raw: &[u8]) -> i64 {
    raw.try_into().map(i64::from_be_bytes).unwrap_or(i64::MIN)
}

impl Store {
    pub fn create_session(&self, session: &AuthSession) -> Result<(), StoreError> {
        let key = keys::session_key(&session.token_hash)?;
        let index_key = keys::session_user_index_key(&session.user_id, &session.token_hash)?;
        let value = Self::serialize(session)?;
        let issued_at = issued_at_bytes(session);

        self.sessions
            .transaction(|tx| {
                tx.insert(key.as_bytes(), value.as_slice())?;
                tx.insert(index_key.as_bytes(), &issued_at[..])?;
                Ok(())
            })
            .map_err(map_tx_error("session", &key))
    }

    /// 过期会话视为不存在，实际删除由 session_cleanup 任务完成
    pub fn get_session(&self, token_hash: &str) -> Result<Option<AuthSession>, StoreError> {
        let key = keys::session_key(token_hash)?;
        let Some(raw) = self.sessions.get(key.as_bytes())? else {
            return Ok(None);
        };
        let session: AuthSession = Self::deserialize(&raw)?;
        Ok((!session.is_expired(Utc::now())).then_some(session))
    }

    /// 删除不存在的会话不报错
    pub fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        let key = keys::session_key(token_hash)?;
        let Some(raw) = self.sessions.get(key.as_bytes())? else {
            return Ok(());
        };
        let index_key = Self::deserialize::<AuthSession>(&raw)
            .ok()
            .and_then(|s| keys::session_user_index_key(&s.user_id, token_hash).ok());

        self.sessions
            .transaction(|tx| {
                tx.remove(key.as_bytes())?;
                if let Some(index_key) = &index_key {
                    tx.remove(index_key.as_bytes())?;
                }
                Ok(())
            })
            .map_err(map_tx_error("session", token_hash))
    }

    pub fn count_user_sessions(&self, user_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::session_user_index_prefix(user_id)?;
        let mut count = 0;
        for item in self.sessions.scan_prefix(prefix.as_bytes()) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// 只保留最新的 `keep` 个会话，返回被淘汰的数量
    pub fn evict_oldest_user_sessions(&self, user_id: &str, keep: usize) -> Result<usize, StoreError> {
        let prefix = keys::session_user_index_prefix(user_id)?;
        let mut entries: Vec<(i64, String)> = Vec::new();
        for item in self.sessions.scan_prefix(prefix.as_bytes()) {
            let (k, v) = item?;
            let Some(hash) = std::str::from_utf8(&k[prefix.len()..]).ok() else {
                continue;
            };
            entries.push((issued_at_from_bytes(&v), hash.to_string()));
        }

        if entries.len() <= keep {
            return Ok(0);
        }
        entries.sort_unstable();
        let excess = entries.len() - keep;
        for (_, hash) in entries.into_iter().take(excess) {
            self.delete_session(&hash)?;
        }
        Ok(excess)
    }

    /// 删除一批在 `now` 之前过期的会话，返回删除数
    pub fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut expired = Vec::new();
        for item in self.sessions.iter() {
            let (k, v) = item?;
            if k.starts_with(b"user:") {
                continue;
            }
            let session: AuthSession = Self::deserialize(&v)?;
            if session.is_expired(now) {
                expired.push(session.token_hash);
                if expired.len() >= EXPIRED_BATCH {
                    break;
                }
            }
        }

        for token_hash in &expired {
            self.delete_session(token_hash)?;
        }
        Ok(expired.len())
    }
}
