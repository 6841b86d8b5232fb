//! DNS hostname syntax validation.
//!
//! Labels are 1..63 bytes from `[A-Za-z0-9-]`, must not start with `-`,
//! separated by dots, total length 1..255. This is a syntax check only — it
//! does not resolve anything; resolution happens at the transport layer
//! where a DNS-unresolvable name is reported as `ENODEV`.

/// Validate a hostname's syntax.
///
/// # Errors
///
/// Returns [`HostnameError`] describing the first violated rule.
pub fn validate(name: &str) -> Result<(), HostnameError> {
    if name.is_empty() || name.len() > 255 {
        return Err(HostnameError::InvalidLength(name.len()));
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(HostnameError::InvalidLabelLength(label.to_string()));
        }
        if label.starts_with('-') {
            return Err(HostnameError::LabelStartsWithHyphen(label.to_string()));
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(HostnameError::InvalidCharacter(label.to_string()));
        }
    }

    Ok(())
}

/// Hostname syntax violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostnameError {
    #[error("hostname length {0} out of range 1..255")]
    InvalidLength(usize),
    #[error("label {0:?} out of range 1..63 bytes")]
    InvalidLabelLength(String),
    #[error("label {0:?} starts with a hyphen")]
    LabelStartsWithHyphen(String),
    #[error("label {0:?} contains characters outside [A-Za-z0-9-]")]
    InvalidCharacter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_names() {
        assert!(validate("example.com").is_ok());
        assert!(validate("a").is_ok());
        assert!(validate("worker-01.internal.example").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(validate(""), Err(HostnameError::InvalidLength(0)));
    }

    #[test]
    fn rejects_label_starting_with_hyphen() {
        assert!(matches!(
            validate("-bad.example.com"),
            Err(HostnameError::LabelStartsWithHyphen(_))
        ));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(matches!(
            validate("bad_host.example.com"),
            Err(HostnameError::InvalidCharacter(_))
        ));
    }

    #[test]
    fn rejects_oversized_label() {
        let label = "a".repeat(64);
        assert!(matches!(
            validate(&label),
            Err(HostnameError::InvalidLabelLength(_))
        ));
    }

    #[test]
    fn rejects_oversized_total() {
        let name = format!("{}.com", "a".repeat(252));
        assert!(matches!(
            validate(&name),
            Err(HostnameError::InvalidLength(_))
        ));
    }
}
