use github_star_history::cache::CacheError;
use github_star_history::error::{Result, StarHistoryError};
use std::error::Error;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_error_display() {
    let error = StarHistoryError::RateLimitExceeded("Rate limit hit".to_string());
    assert_eq!(format!("{}", error), "Rate limit exceeded: Rate limit hit");

    let error = StarHistoryError::NotFound("owner/repo".to_string());
    assert_eq!(format!("{}", error), "Resource not found: owner/repo");

    let error = StarHistoryError::ApiError("API failed".to_string());
    assert_eq!(format!("{}", error), "GitHub API error: API failed");

    let error = StarHistoryError::NoValidTokens;
    assert_eq!(format!("{}", error), "no valid tokens left");

    let error = StarHistoryError::TooManyStars {
        pages: 401,
        max_pages: 400,
    };
    assert!(format!("{}", error).starts_with("repo has too many stargazers"));
}

#[test]
fn test_error_source() {
    let error = StarHistoryError::RateLimitExceeded("Rate limit hit".to_string());
    assert!(error.source().is_none());

    let json_err = serde_json::from_str::<Vec<u32>>("nope").unwrap_err();
    let error: StarHistoryError = json_err.into();
    assert!(error.source().is_some());
}

#[test]
fn test_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: StarHistoryError = io_error.into();
    assert!(matches!(error, StarHistoryError::IoError(_)));
}

#[test]
fn test_rate_limit_is_distinguishable() {
    assert!(StarHistoryError::RateLimitExceeded("x".to_string()).is_rate_limit());
    assert!(!StarHistoryError::NoValidTokens.is_rate_limit());
    assert!(!StarHistoryError::ApiError("x".to_string()).is_rate_limit());
}

#[test]
fn test_cache_miss_display() {
    let error = CacheError::Miss("owner/repo_1_etag".to_string());
    assert_eq!(error.to_string(), "cache miss: owner/repo_1_etag");
}

#[test]
fn test_result_type() {
    fn returns_result() -> Result<String> {
        Ok("success".to_string())
    }

    let value = assert_ok!(returns_result());
    assert_eq!(value, "success");

    fn returns_error() -> Result<String> {
        Err(StarHistoryError::NotFound("Not found".to_string()))
    }

    assert_err!(returns_error());
}
