use crate::store::StoreError;

/// 键段不得为空或含分隔符，否则前缀扫描会串到别的用户
fn segment(value: &str, what: &str) -> Result<(), StoreError> {
    if value.is_empty() || value.contains(':') {
        return Err(StoreError::Validation(format!("invalid {what} key segment")));
    }
    Ok(())
}

fn reverse_ts(timestamp_ms: i64) -> u64 {
    u64::MAX - timestamp_ms.max(0) as u64
}

pub fn user_key(user_id: &str) -> Result<String, StoreError> {
    segment(user_id, "user_id")?;
    Ok(user_id.to_string())
}

pub fn user_email_index_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn session_key(token_hash: &str) -> Result<String, StoreError> {
    segment(token_hash, "token_hash")?;
    Ok(token_hash.to_string())
}

pub fn session_user_index_key(user_id: &str, token_hash: &str) -> Result<String, StoreError> {
    segment(user_id, "user_id")?;
    segment(token_hash, "token_hash")?;
    Ok(format!("user:{}:{}", user_id, token_hash))
}

pub fn session_user_index_prefix(user_id: &str) -> Result<String, StoreError> {
    segment(user_id, "user_id")?;
    Ok(format!("user:{}:", user_id))
}

pub fn detection_session_key(session_id: &str) -> Result<String, StoreError> {
    segment(session_id, "session_id")?;
    Ok(session_id.to_string())
}

/// 按开始时间倒序的用户索引
pub fn detection_session_user_index_key(
    user_id: &str,
    started_at_ms: i64,
    session_id: &str,
) -> Result<String, StoreError> {
    segment(user_id, "user_id")?;
    segment(session_id, "session_id")?;
    Ok(format!(
        "user:{}:{:020}:{}",
        user_id,
        reverse_ts(started_at_ms),
        session_id
    ))
}

pub fn detection_session_user_prefix(user_id: &str) -> Result<String, StoreError> {
    segment(user_id, "user_id")?;
    Ok(format!("user:{}:", user_id))
}

pub fn verdict_key(user_id: &str, timestamp_ms: i64, verdict_id: &str) -> Result<String, StoreError> {
    segment(user_id, "user_id")?;
    segment(verdict_id, "verdict_id")?;
    Ok(format!(
        "{}:{:020}:{}",
        user_id,
        reverse_ts(timestamp_ms),
        verdict_id
    ))
}

pub fn verdict_prefix(user_id: &str) -> Result<String, StoreError> {
    segment(user_id, "user_id")?;
    Ok(format!("{}:", user_id))
}
