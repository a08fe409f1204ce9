//! Shared input validation helpers used across the domain services.

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{ServiceError, ServiceResult};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

static ADMIN_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]{3,50}$").unwrap());

/// Email is optional everywhere; empty passes, malformed fails.
pub fn is_valid_email(email: &str) -> bool {
    email.is_empty() || EMAIL_RE.is_match(email)
}

pub fn is_valid_admin_name(name: &str) -> bool {
    ADMIN_NAME_RE.is_match(name)
}

/// Character-count ceiling (not bytes; descriptions hold CJK text).
pub fn check_length(field: &str, value: &str, max_chars: usize) -> ServiceResult<()> {
    if value.chars().count() > max_chars {
        return Err(ServiceError::validation(format!(
            "{} must not exceed {} characters",
            field, max_chars
        )));
    }
    Ok(())
}

pub fn check_email(value: &str) -> ServiceResult<()> {
    if !is_valid_email(value) {
        return Err(ServiceError::validation("invalid email format"));
    }
    Ok(())
}

/// Require a value to be one of a fixed enumeration.
pub fn check_enum(field: &str, value: i16, valid: &[i16]) -> ServiceResult<()> {
    if !valid.contains(&value) {
        return Err(ServiceError::validation(format!("invalid {}", field)));
    }
    Ok(())
}

/// Parse a date given as `YYYY-MM-DD`, or as a unix timestamp in seconds or
/// milliseconds (the admin frontend sends both).
pub fn parse_date(field: &str, value: &str) -> ServiceResult<NaiveDate> {
    let value = value.trim();

    if value.chars().all(|c| c.is_ascii_digit()) {
        let parsed = match value.len() {
            13 => value
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis),
            10 => value
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            _ => None,
        };
        if let Some(dt) = parsed {
            return Ok(dt.date_naive());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ServiceError::validation(format!("{} must be formatted as YYYY-MM-DD", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email(""));
        assert!(is_valid_email("alice@lab.example.edu"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn admin_name_validation() {
        assert!(is_valid_admin_name("admin_01"));
        assert!(is_valid_admin_name("ops-team"));
        assert!(!is_valid_admin_name("ab"));
        assert!(!is_valid_admin_name("bad name"));
        assert!(!is_valid_admin_name(&"x".repeat(51)));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let cjk = "字".repeat(10);
        assert!(check_length("desc", &cjk, 10).is_ok());
        assert!(check_length("desc", &cjk, 9).is_err());
    }

    #[test]
    fn date_parsing_accepts_all_three_forms() {
        assert_eq!(
            parse_date("d", "2024-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        // 2024-03-15 00:00:00 UTC
        assert_eq!(
            parse_date("d", "1710460800").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert_eq!(
            parse_date("d", "1710460800000").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
        assert!(parse_date("d", "15/03/2024").is_err());
    }

    #[test]
    fn enum_membership() {
        assert!(check_enum("mem_type", 1, &[0, 1, 2]).is_ok());
        assert!(check_enum("mem_type", 3, &[0, 1, 2]).is_err());
    }
}
