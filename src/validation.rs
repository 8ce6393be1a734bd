//! 注册输入校验

use crate::response::AppError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 256;
const MAX_EMAIL_LEN: usize = 254;

/// 至少 8 字符，含字母和数字
pub fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AppError::bad_request(
            "AUTH_WEAK_PASSWORD",
            "密码长度需在8到256个字符之间",
        ));
    }
    let has_alpha = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_alpha || !has_digit {
        return Err(AppError::bad_request(
            "AUTH_WEAK_PASSWORD",
            "密码必须同时包含字母和数字",
        ));
    }
    Ok(())
}

/// 只做形状检查：local@domain.tld
pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let invalid = || AppError::bad_request("AUTH_INVALID_EMAIL", "Invalid email format");

    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(email)
}

/// 2-50 字符，字母数字、下划线、连字符和空格
pub fn normalize_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    let count = username.chars().count();
    let allowed = username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ');
    if !(2..=50).contains(&count) || !allowed {
        return Err(AppError::bad_request(
            "AUTH_INVALID_USERNAME",
            "用户名需为2到50个字符，只能包含字母、数字、下划线、连字符和空格",
        ));
    }
    Ok(username.to_string())
}
