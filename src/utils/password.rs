use bcrypt::{DEFAULT_COST, hash, verify};

use crate::error::{AppError, AppResult};

const MIN_LEN: usize = 8;
const MAX_LEN: usize = 128;
/// 短于该长度的用户名片段不参与比对
const MIN_IDENTITY_LEN: usize = 3;

/// 注册密码检查：长度、大小写字母与数字，且不能包含用户名或邮箱前缀
pub fn validate_password(password: &str, email: &str, username: &str) -> AppResult<()> {
    let len = password.chars().count();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return Err(AppError::ValidationError(format!(
            "Password must be between {MIN_LEN} and {MAX_LEN} characters"
        )));
    }

    let has_lowercase = password.chars().any(char::is_lowercase);
    let has_uppercase = password.chars().any(char::is_uppercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_lowercase || !has_uppercase || !has_digit {
        return Err(AppError::ValidationError(
            "Password must contain upper and lower case letters and a digit".to_string(),
        ));
    }

    let lowered = password.to_lowercase();
    let local_part = email.split('@').next().unwrap_or_default();
    let identities = [username.trim(), local_part.trim()];
    if identities
        .iter()
        .map(|part| part.to_lowercase())
        .any(|part| part.chars().count() >= MIN_IDENTITY_LEN && lowered.contains(&part))
    {
        return Err(AppError::ValidationError(
            "Password must not contain your username or email".to_string(),
        ));
    }

    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("Password verification failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        let ok = |p| validate_password(p, "ana@example.com", "Ana Demo");
        assert!(ok("Password123").is_ok());
        assert!(ok("password123").is_err()); // 缺少大写
        assert!(ok("PASSWORD123").is_err()); // 缺少小写
        assert!(ok("Password").is_err()); // 缺少数字
        assert!(ok("Pass123").is_err()); // 太短
        assert!(ok("Ñandú1234").is_ok());
    }

    #[test]
    fn test_password_must_not_contain_identity() {
        assert!(validate_password("Luckyfox2024", "luckyfox@example.com", "Player").is_err());
        assert!(validate_password("xxPLAYER1one", "ana@example.com", "player").is_err());
        // 两个字符的用户名不参与比对
        assert!(validate_password("Jo12345678x", "ana@example.com", "jo").is_ok());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let password = "Password123";
        let hashed = hash_password(password).unwrap();

        assert!(verify_password(password, &hashed).unwrap());
        assert!(!verify_password("WrongPassword", &hashed).unwrap());
    }
}
