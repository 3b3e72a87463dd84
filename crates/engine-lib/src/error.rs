//! Error types for the orchestration engine

use thiserror::Error;

/// Errors surfaced by engine operations
///
/// Insufficient history is not an error: analyses degrade to low-confidence
/// results instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A module or tenant identifier was empty or blank
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The telemetry source could not produce readings for an instance
    #[error("metrics unavailable for {instance}: {reason}")]
    MetricsUnavailable { instance: String, reason: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Reject empty or whitespace-only identifiers
pub fn validate_id(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EngineError::InvalidIdentifier(format!("{} must not be empty", kind)));
    }
    Ok(())
}

/// Validate an optional tenant identifier
pub fn validate_tenant(tenant_id: Option<&str>) -> Result<()> {
    match tenant_id {
        Some(tenant) => validate_id("tenant_id", tenant),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id_rejects_blank() {
        assert!(validate_id("module_id", "").is_err());
        assert!(validate_id("module_id", "   ").is_err());
        assert!(validate_id("module_id", "billing").is_ok());
    }

    #[test]
    fn test_validate_tenant_optional() {
        assert!(validate_tenant(None).is_ok());
        assert!(validate_tenant(Some("acme")).is_ok());
        assert_eq!(
            validate_tenant(Some("")),
            Err(EngineError::InvalidIdentifier("tenant_id must not be empty".to_string()))
        );
    }
}
