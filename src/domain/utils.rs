//! Shared validation for tool arguments

use std::collections::HashSet;

use crate::errors::AppError;

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 200;
pub const MAX_CONTENT_LEN: usize = 500;

pub fn normalize_limit(limit: Option<u32>) -> Result<usize, AppError> {
    let limit = limit.map_or(DEFAULT_LIST_LIMIT, |value| value as usize);
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(AppError::bad_request(
            "invalid_limit",
            "limit must be between 1 and 200",
        ));
    }

    Ok(limit)
}

/// Todoist ids are opaque; only the character set is checked so they are safe in URL paths.
pub fn normalize_id(value: Option<String>, code: &'static str) -> Result<Option<String>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let normalized = value.trim();
    if normalized.is_empty()
        || !normalized
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '-' || character == '_')
    {
        return Err(AppError::bad_request(
            code,
            "ids must contain only alphanumeric characters, dashes and underscores",
        ));
    }

    Ok(Some(normalized.to_string()))
}

pub fn normalize_content(content: &str) -> Result<String, AppError> {
    let normalized = content.trim();
    if normalized.is_empty() {
        return Err(AppError::bad_request(
            "invalid_content",
            "content must not be empty",
        ));
    }

    if normalized.chars().count() > MAX_CONTENT_LEN {
        return Err(AppError::bad_request(
            "invalid_content",
            "content must not exceed 500 characters",
        ));
    }

    Ok(normalized.to_string())
}

pub fn normalize_priority(priority: Option<u32>) -> Result<Option<u8>, AppError> {
    match priority {
        None => Ok(None),
        Some(value @ 1..=4) => Ok(Some(value as u8)),
        Some(_) => Err(AppError::bad_request(
            "invalid_priority",
            "priority must be between 1 (normal) and 4 (urgent)",
        )),
    }
}

/// Trims optional free text; blank strings are treated as absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Trimmed, non-blank labels in first-seen order without repeats.
pub fn normalize_labels(labels: Option<Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .unwrap_or_default()
        .into_iter()
        .filter_map(|label| optional_text(Some(label)))
        .filter(|label| seen.insert(label.clone()))
        .collect()
}
