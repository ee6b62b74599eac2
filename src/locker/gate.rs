use crate::error::LockerError;

/// Shared-secret gate in front of every destructive operation. Fails
/// closed: no configured secret means no rename or delete can proceed.
pub fn require(configured: Option<&str>, supplied: Option<&str>) -> Result<(), LockerError> {
    let Some(expected) = configured.map(str::trim).filter(|s| !s.is_empty()) else {
        return Err(LockerError::Unauthorized(
            "no destructive-operation secret is configured (set EVLOCK_DELETE_SECRET)".to_string(),
        ));
    };
    let Some(given) = supplied.map(str::trim).filter(|s| !s.is_empty()) else {
        return Err(LockerError::Unauthorized(
            "a secret is required for this operation".to_string(),
        ));
    };
    if given != expected {
        return Err(LockerError::Unauthorized(
            "invalid secret for this operation".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::require;
    use crate::error::LockerError;

    #[test]
    fn gate_accepts_only_the_configured_secret() {
        assert!(require(Some("s3cret"), Some("s3cret")).is_ok());
        assert!(require(Some("s3cret"), Some(" s3cret ")).is_ok());
        assert!(matches!(
            require(Some("s3cret"), Some("wrong")),
            Err(LockerError::Unauthorized(_))
        ));
        assert!(matches!(
            require(Some("s3cret"), None),
            Err(LockerError::Unauthorized(_))
        ));
    }

    #[test]
    fn gate_fails_closed_without_configuration() {
        assert!(matches!(
            require(None, Some("anything")),
            Err(LockerError::Unauthorized(_))
        ));
        assert!(matches!(
            require(Some("   "), Some("anything")),
            Err(LockerError::Unauthorized(_))
        ));
    }
}
