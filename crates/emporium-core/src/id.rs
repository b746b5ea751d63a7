use crate::error::{CoreError, Result};

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ids are opaque strings, but they end up in cache keys and URL paths.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CoreError::invalid_id("id must not be empty"));
    }
    if id.len() > 64 {
        return Err(CoreError::invalid_id(format!("id too long: {} chars", id.len())));
    }
    if id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, ':' | '/' | '?' | '#' | '%'))
    {
        return Err(CoreError::invalid_id(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(validate_id(&a).is_ok());
    }

    #[test]
    fn rejects_separator_characters() {
        assert!(validate_id("").is_err());
        assert!(validate_id("user:1").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("with space").is_err());
        assert!(validate_id("alice?x").is_err());
        assert!(validate_id("alice#x").is_err());
        assert!(validate_id("50%25").is_err());
        assert!(validate_id("65f1c2").is_ok());
    }
}
