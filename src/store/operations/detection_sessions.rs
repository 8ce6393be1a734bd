use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::{DetectionConfig, Verdict};
use crate::store::keys;
use crate::store::{map_tx_error, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSessionRecord {
    pub id: String,
    pub user_id: String,
    pub config: DetectionConfig,
    pub status: DetectionStatus,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub frames_processed: u64,
    #[serde(default)]
    pub total_blinks: u64,
    #[serde(default)]
    pub verdict_count: u64,
    #[serde(default)]
    pub last_verdict: Option<Verdict>,
}

impl DetectionSessionRecord {
    pub fn new(id: &str, user_id: &str, config: DetectionConfig) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            config,
            status: DetectionStatus::Running,
            started_at: Utc::now(),
            stopped_at: None,
            frames_processed: 0,
            total_blinks: 0,
            verdict_count: 0,
            last_verdict: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == DetectionStatus::Running
    }
}

impl Store {
    pub fn create_detection_session(
        &self,
        record: &DetectionSessionRecord,
    ) -> Result<(), StoreError> {
        let key = keys::detection_session_key(&record.id)?;
        let index_key = keys::detection_session_user_index_key(
            &record.user_id,
            record.started_at.timestamp_millis(),
            &record.id,
        )?;
        let bytes = Self::serialize(record)?;

        let key_bytes = key.as_bytes().to_vec();
        let index_bytes = index_key.as_bytes().to_vec();
        self.detection_sessions
            .transaction(move |tx| {
                if tx.get(key_bytes.as_slice())?.is_some() {
                    return sled::transaction::abort(());
                }
                tx.insert(key_bytes.as_slice(), bytes.as_slice())?;
                tx.insert(index_bytes.as_slice(), key_bytes.as_slice())?;
                Ok(())
            })
            .map_err(map_tx_error("detection_session", &record.id))?;
        Ok(())
    }

    pub fn get_detection_session(
        &self,
        session_id: &str,
    ) -> Result<Option<DetectionSessionRecord>, StoreError> {
        let key = keys::detection_session_key(session_id)?;
        match self.detection_sessions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 只覆盖主记录，索引键由 id/user/started_at 决定，不会变化
    pub fn update_detection_session(
        &self,
        record: &DetectionSessionRecord,
    ) -> Result<(), StoreError> {
        let key = keys::detection_session_key(&record.id)?;
        if !self.detection_sessions.contains_key(key.as_bytes())? {
            return Err(StoreError::NotFound {
                entity: "detection_session".to_string(),
                key: record.id.clone(),
            });
        }
        self.detection_sessions
            .insert(key.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }

    /// 最新的在前
    pub fn list_user_detection_sessions(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<DetectionSessionRecord>, u64), StoreError> {
        let prefix = keys::detection_session_user_prefix(user_id)?;
        let mut items = Vec::new();
        let mut total = 0u64;

        for item in self.detection_sessions.scan_prefix(prefix.as_bytes()) {
            let (_, primary_key) = item?;
            let index = total as usize;
            total += 1;
            if index < offset || items.len() >= limit {
                continue;
            }
            match self.detection_sessions.get(&primary_key)? {
                Some(raw) => items.push(Self::deserialize(&raw)?),
                None => {
                    tracing::warn!(user_id, "Dangling detection session index entry");
                }
            }
        }

        Ok((items, total))
    }

    /// 返回所有仍标记为 running 的会话
    pub fn list_running_detection_sessions(
        &self,
    ) -> Result<Vec<DetectionSessionRecord>, StoreError> {
        let mut running = Vec::new();
        for item in self.detection_sessions.iter() {
            let (k, v) = item?;
            if k.starts_with(b"user:") {
                continue;
            }
            let record: DetectionSessionRecord = Self::deserialize(&v)?;
            if record.is_running() {
                running.push(record);
            }
        }
        Ok(running)
    }
}
