use serde::{Deserialize, Serialize};

use crate::error::{ForumError, Result};

// Max limit to prevent excessive requests
const MAX_PAGE_LIMIT: u64 = 100;

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageParams {
    // Zero means "use the configured page size".
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    offset: u64,
}

impl PageParams {
    pub fn new(offset: u64) -> Self {
        Self { limit: 0, offset }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self, default_limit: u64) -> u64 {
        if self.limit == 0 {
            default_limit.clamp(1, MAX_PAGE_LIMIT)
        } else {
            self.limit.clamp(1, MAX_PAGE_LIMIT)
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// One page of results and whether anything follows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Builds a page from a query that fetched `limit + 1` rows.
    pub(crate) fn from_overfetch(mut rows: Vec<T>, limit: u64) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        Self {
            items: rows,
            has_more,
        }
    }
}

/// Trims `value` and checks it is non-empty and at most `max_chars` long.
pub(crate) fn require_text(field: &str, value: &str, max_chars: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ForumError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ForumError::validation(format!(
            "{field} exceeds maximum length of {max_chars} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// `LIKE` pattern matching `needle` literally anywhere, for use with `ESCAPE '\'`.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
