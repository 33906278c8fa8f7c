use thiserror::Error;

use crate::models::Table;

/// Join codes are always exactly this many characters.
pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("couple code must be exactly 6 characters")]
    CodeLength,

    #[error("rows in {0} cannot be updated")]
    Immutable(Table),
}

/// Inputs that are trimmed and checked before they reach the store.
/// Run on the client before any network call and again on the server.
pub trait Draft: Sized {
    fn normalized(self) -> Result<Self, ValidationError>;
}

/// Trim a required text field and enforce its length limit (in chars).
pub fn required(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field. Blank input collapses to `None`.
pub fn optional(
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(trimmed) if trimmed.chars().count() > max => {
            Err(ValidationError::TooLong { field, max })
        }
        Some(trimmed) => Ok(Some(trimmed.to_string())),
    }
}

/// Canonical form of a user-typed join code: trimmed and uppercased.
pub fn normalize_code(code: &str) -> Result<String, ValidationError> {
    let code = code.trim().to_uppercase();
    if code.chars().count() != CODE_LENGTH {
        return Err(ValidationError::CodeLength);
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_counts_chars() {
        assert_eq!(required("title", "  walk  ", 10).unwrap(), "walk");
        assert_eq!(required("title", "   ", 10), Err(ValidationError::Empty("title")));
        // 5 chars, 10 bytes
        assert!(required("title", "ñññññ", 5).is_ok());
        assert_eq!(
            required("title", "ñññññ", 4),
            Err(ValidationError::TooLong { field: "title", max: 4 })
        );
    }

    #[test]
    fn optional_collapses_blank() {
        assert_eq!(optional("notes", Some("   ".into()), 5).unwrap(), None);
        assert_eq!(optional("notes", None, 5).unwrap(), None);
        assert_eq!(optional("notes", Some(" hi ".into()), 5).unwrap(), Some("hi".into()));
        assert!(optional("notes", Some("toolong".into()), 5).is_err());
    }

    #[test]
    fn codes_are_uppercased_and_length_checked() {
        assert_eq!(normalize_code(" ab12cd ").unwrap(), "AB12CD");
        assert_eq!(normalize_code("ABC"), Err(ValidationError::CodeLength));
        assert_eq!(normalize_code("ABCDEFG"), Err(ValidationError::CodeLength));
    }
}
