use shared_models::error::AppError;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 500;

/// Resolves a `limit` query parameter, rejecting values outside `1..=MAX_LIMIT`.
pub fn resolve_limit(limit: Option<i64>) -> Result<i64, AppError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(value) if (1..=MAX_LIMIT).contains(&value) => Ok(value),
        Some(value) => Err(AppError::ValidationError(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, value
        ))),
    }
}

/// Splits a comma separated filter into trimmed, upper-cased values.
pub fn status_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Trims a required text field, rejecting blanks.
pub fn require_text(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn limit_bounds() {
        assert_eq!(resolve_limit(None).unwrap(), 100);
        assert_eq!(resolve_limit(Some(500)).unwrap(), 500);
        assert_matches!(resolve_limit(Some(0)), Err(AppError::ValidationError(_)));
        assert_matches!(resolve_limit(Some(501)), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn statuses_are_split_and_uppercased() {
        assert_eq!(status_list(Some("checked_in, Roomed,,")), vec!["CHECKED_IN", "ROOMED"]);
        assert!(status_list(None).is_empty());
    }

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(require_text("  E1 ", "emrId").unwrap(), "E1");
        assert_matches!(require_text("   ", "emrId"), Err(AppError::ValidationError(_)));
    }
}
