use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{map_tx_error, Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// 已规范化为小写
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, username: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            username: username.to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Store {
    /// 用户记录和邮箱索引在同一事务里写入，邮箱已被占用时返回 Conflict
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let user_key = keys::user_key(&user.id)?;
        let email_key = keys::user_email_index_key(&user.email);
        let value = Self::serialize(user)?;

        self.users
            .transaction(|tx| {
                if tx.get(email_key.as_bytes())?.is_some() {
                    return sled::transaction::abort(());
                }
                tx.insert(email_key.as_bytes(), user.id.as_bytes())?;
                tx.insert(user_key.as_bytes(), value.as_slice())?;
                Ok(())
            })
            .map_err(map_tx_error("user_email", &user.email))
    }

    pub fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let key = keys::user_key(user_id)?;
        self.users
            .get(key.as_bytes())?
            .map(|raw| Self::deserialize(&raw))
            .transpose()
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let index_key = keys::user_email_index_key(email);
        let Some(raw_id) = self.users.get(index_key.as_bytes())? else {
            return Ok(None);
        };
        let user_id = std::str::from_utf8(&raw_id)
            .map_err(|e| StoreError::Validation(format!("corrupt email index entry: {e}")))?;
        self.get_user_by_id(user_id)
    }
}
