use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::Verdict;
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictRecord {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub verdict: Verdict,
    pub window_blinks: u32,
    pub total_blinks: u64,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn record_verdict(&self, record: &VerdictRecord) -> Result<(), StoreError> {
        let key = keys::verdict_key(
            &record.user_id,
            record.created_at.timestamp_millis(),
            &record.id,
        )?;
        self.verdicts
            .insert(key.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }

    /// 最新的在前，返回 (当前页, 总数)
    pub fn list_user_verdicts(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<VerdictRecord>, u64), StoreError> {
        let prefix = keys::verdict_prefix(user_id)?;
        let mut items = Vec::new();
        let mut total = 0u64;

        for item in self.verdicts.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            let index = total as usize;
            total += 1;
            if index >= offset && items.len() < limit {
                items.push(Self::deserialize(&value)?);
            }
        }

        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;

    fn sample(id: &str, user_id: &str, offset_secs: i64) -> VerdictRecord {
        VerdictRecord {
            id: id.to_string(),
            user_id: user_id.to_string(),
            session_id: "s1".to_string(),
            verdict: Verdict::Normal,
            window_blinks: 3,
            total_blinks: 3,
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn pagination_is_newest_first() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("verdicts-db").to_str().unwrap()).unwrap();

        for i in 0..5 {
            store.record_verdict(&sample(&format!("v{i}"), "u1", i)).unwrap();
        }
        store.record_verdict(&sample("x", "u2", 0)).unwrap();

        let (page, total) = store.list_user_verdicts("u1", 2, 1).unwrap();
        assert_eq!(total, 5);
        let ids: Vec<_> = page.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v3", "v2"]);
    }
}
