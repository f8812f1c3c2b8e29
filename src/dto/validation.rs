//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest username accepted, counted in characters after trimming.
pub const MAX_USERNAME_CHARS: usize = 40;

/// Validates that a username has visible content and no control characters.
///
/// # Examples
///
/// ```ignore
/// validate_username("Ana")     // Ok
/// validate_username("   ")     // Err - blank
/// validate_username("A\tna")   // Err - control character
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("username_blank");
        err.message = Some("Username must not be empty".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_USERNAME_CHARS {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be at most {MAX_USERNAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("username_format");
        err.message = Some("Username must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("Ana").is_ok());
        assert!(validate_username("  João Pedro ").is_ok());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_CHARS)).is_ok());
    }

    #[test]
    fn test_validate_username_blank() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
    }

    #[test]
    fn test_validate_username_invalid_format() {
        assert!(validate_username("A\tna").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_CHARS + 1)).is_err());
    }
}
