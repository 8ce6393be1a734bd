//! 存储布局版本。版本号保存在 meta 树，只增不减。

use chrono::Utc;

use crate::store::keys;
use crate::store::operations::detection_sessions::DetectionStatus;
use crate::store::operations::users::User;
use crate::store::{Store, StoreError};

const VERSION_KEY: &[u8] = b"schema_version";

struct Migration {
    version: u32,
    name: &'static str,
    /// 必须幂等：迁移完成后、写版本号前崩溃会导致重跑
    apply: fn(&Store) -> Result<(), StoreError>,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "user_email_index",
    apply: backfill_email_index,
}];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = current_version(store)?;
    if current > latest_version() {
        return Err(StoreError::Migration {
            version: current,
            message: format!("database is newer than this build (max {})", latest_version()),
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(version = migration.version, name = migration.name, "Applying migration");
        (migration.apply)(store).map_err(|e| StoreError::Migration {
            version: migration.version,
            message: e.to_string(),
        })?;
        set_version(store, migration.version)?;
    }
    Ok(())
}

pub fn current_version(store: &Store) -> Result<u32, StoreError> {
    let Some(raw) = store.meta.get(VERSION_KEY)? else {
        return Ok(0);
    };
    let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
        version: 0,
        message: format!("corrupt version marker ({} bytes)", raw.len()),
    })?;
    Ok(u32::from_be_bytes(bytes))
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("refusing to downgrade from {current}"),
        });
    }
    store.meta.insert(VERSION_KEY, &version.to_be_bytes())?;
    Ok(())
}

/// 为缺少邮箱索引的用户补写索引
fn backfill_email_index(store: &Store) -> Result<(), StoreError> {
    let mut repaired = 0;
    for item in store.users.iter() {
        let (key, value) = item?;
        if key.starts_with(b"email:") {
            continue;
        }
        let user: User = Store::deserialize(&value)?;
        let index_key = keys::user_email_index_key(&user.email);
        if store.users.get(index_key.as_bytes())?.is_none() {
            store.users.insert(index_key.as_bytes(), user.id.as_bytes())?;
            repaired += 1;
        }
    }
    if repaired > 0 {
        tracing::info!(repaired, "Rebuilt missing email index entries");
    }
    Ok(())
}

/// 进程退出时仍在运行的检测会话不会再收到帧，启动时统一标记为已停止
pub fn close_interrupted_sessions(store: &Store) -> Result<usize, StoreError> {
    let interrupted = store.list_running_detection_sessions()?;
    let count = interrupted.len();
    let stopped_at = Utc::now();
    for mut record in interrupted {
        record.status = DetectionStatus::Stopped;
        record.stopped_at = Some(stopped_at);
        store.update_detection_session(&record)?;
    }
    Ok(count)
}
