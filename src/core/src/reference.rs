//! Repository and tag name handling.
//!
//! Parses references like `registry:5000/team/app:v1` into a repository and
//! a tag, and validates the names bound into the tag index.

use crate::error::{Result, StoreError};
use crate::image::ID_LENGTH;

/// Default tag when none is specified.
pub const DEFAULT_TAG: &str = "latest";

/// Maximum tag length.
const MAX_TAG_LENGTH: usize = 128;

/// Split `repo[:tag]` into its repository and tag.
///
/// The tag is empty when the reference carries none. A suffix containing `/`
/// belongs to a registry port (`localhost:5000/app`) and is not a tag.
pub fn parse_repository_tag(reference: &str) -> (String, String) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
        _ => (reference.to_string(), String::new()),
    }
}

/// Validate a repository name.
///
/// Components are separated by `/` and use `[a-z0-9._-]`. A first component
/// containing `.` or `:` (or equal to `localhost`) is a registry host and is
/// accepted as-is. 64-character hex names are rejected so a repository can
/// never be confused with an image ID.
pub fn validate_repository_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidReference(
            "Repository name can't be empty".to_string(),
        ));
    }

    if name.len() == ID_LENGTH && name.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidReference(format!(
            "Invalid repository name ({}), cannot specify 64-byte hexadecimal strings",
            name
        )));
    }

    let mut components: Vec<&str> = name.split('/').collect();
    if components.len() > 1 {
        let first = components[0];
        if first.contains('.') || first.contains(':') || first == "localhost" {
            components.remove(0);
        }
    }

    for component in components {
        let valid = !component.is_empty()
            && component
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"._-".contains(&b));
        if !valid {
            return Err(StoreError::InvalidReference(format!(
                "Invalid repository name ({}), only [a-z0-9-_.] are allowed",
                name
            )));
        }
    }

    Ok(())
}

/// Validate a tag name: `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`.
pub fn validate_tag_name(tag: &str) -> Result<()> {
    let mut bytes = tag.bytes();
    let first_ok = matches!(bytes.next(), Some(b) if b.is_ascii_alphanumeric() || b == b'_');
    let rest_ok = bytes.all(|b| b.is_ascii_alphanumeric() || b"_.-".contains(&b));

    if !first_ok || !rest_ok || tag.len() > MAX_TAG_LENGTH {
        return Err(StoreError::InvalidReference(format!(
            "Illegal tag name ({}): only [A-Za-z0-9_.-] are allowed, minimum 1, maximum {} in length",
            tag, MAX_TAG_LENGTH
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repository_tag() {
        assert_eq!(
            parse_repository_tag("app:v1"),
            ("app".to_string(), "v1".to_string())
        );
        assert_eq!(
            parse_repository_tag("app"),
            ("app".to_string(), String::new())
        );
        assert_eq!(
            parse_repository_tag("localhost:5000/app"),
            ("localhost:5000/app".to_string(), String::new())
        );
        assert_eq!(
            parse_repository_tag("localhost:5000/app:v2"),
            ("localhost:5000/app".to_string(), "v2".to_string())
        );
    }

    #[test]
    fn test_validate_repository_name() {
        assert!(validate_repository_name("lib").is_ok());
        assert!(validate_repository_name("team/app-server").is_ok());
        assert!(validate_repository_name("registry.example.com/team/app").is_ok());
        assert!(validate_repository_name("localhost/app").is_ok());
        assert!(validate_repository_name("localhost:5000/app").is_ok());
    }

    #[test]
    fn test_validate_repository_name_rejects() {
        assert!(validate_repository_name("").is_err());
        assert!(validate_repository_name("App").is_err());
        assert!(validate_repository_name("team//app").is_err());
        assert!(validate_repository_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_tag_name() {
        assert!(validate_tag_name("latest").is_ok());
        assert!(validate_tag_name("v1.2.3-rc_1").is_ok());
        assert!(validate_tag_name("_private").is_ok());
        assert!(validate_tag_name(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn test_validate_tag_name_rejects() {
        assert!(validate_tag_name("").is_err());
        assert!(validate_tag_name(".hidden").is_err());
        assert!(validate_tag_name("-dash").is_err());
        assert!(validate_tag_name("has space").is_err());
        assert!(validate_tag_name(&"a".repeat(129)).is_err());
    }
}
