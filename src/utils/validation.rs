use regex::Regex;
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email pattern is valid")
    })
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if !email_regex().is_match(email) {
        return Err(AppError::ValidationError("Invalid email address".to_string()));
    }
    Ok(())
}

/// 统一邮箱格式（去空格、小写）
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn validate_username(username: &str) -> AppResult<()> {
    let len = username.trim().chars().count();
    if !(2..=32).contains(&len) {
        return Err(AppError::ValidationError(
            "Username must be between 2 and 32 characters".to_string(),
        ));
    }
    Ok(())
}

/// 去空格后非空，且不超过 `max` 个字符
pub fn require_text(field: &str, value: &str, max: usize) -> AppResult<()> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(AppError::ValidationError(format!("{field} is required")));
    }
    if len > max {
        return Err(AppError::ValidationError(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub const SUPPORTED_CURRENCIES: [&str; 6] = ["CLP", "USD", "BTC", "USDT", "ETH", "BNB"];

pub fn validate_currency(currency: &str) -> AppResult<()> {
    if !SUPPORTED_CURRENCIES.contains(&currency) {
        return Err(AppError::ValidationError(format!(
            "Unsupported currency: {currency}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.cl").is_ok());
        assert!(validate_email("user@example").is_err());
        assert!(validate_email("user.example.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("title", "Summer", 10).is_ok());
        assert!(require_text("title", "   ", 10).is_err());
        assert!(require_text("title", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("CLP").is_ok());
        assert!(validate_currency("USDT").is_ok());
        assert!(validate_currency("clp").is_err());
        assert!(validate_currency("EUR").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ana").is_ok());
        assert!(validate_username("a").is_err());
    }
}
