//! Domain types for SCP.
//!
//! Both core value types are defined as **newtypes** — thin wrappers around
//! `String` that give them distinct identities in the type system and
//! enforce the protocol's length rules at construction time, so an
//! already-constructed `Username` or `TextPayload` is always wire-legal.

use std::fmt;

// ---------------------------------------------------------------------------
// Username — the identity a client claims via CONNECT_REQ
// ---------------------------------------------------------------------------

/// A username as claimed in `CONNECT_REQ` and tracked by the registry.
///
/// Validated on construction:
/// - Must not be empty (after trimming)
/// - Must not exceed 255 bytes once UTF-8 encoded (the wire format's
///   username field is length-prefixed by a single byte)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

/// Errors that can occur when creating a `Username`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username cannot be empty")]
    Empty,
    #[error("username cannot exceed {max} bytes (got {got})")]
    TooLong { max: usize, got: usize },
}

impl Username {
    /// Maximum encoded length, per the wire format's one-byte length prefix.
    pub const MAX_LEN: usize = 255;

    pub fn new(name: impl Into<String>) -> Result<Self, UsernameError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(UsernameError::Empty);
        }
        if name.len() > Self::MAX_LEN {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LEN,
                got: name.len(),
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// TextPayload — the body of a TEXT message
// ---------------------------------------------------------------------------

/// The text body of a `TEXT` PDU.
///
/// Validated on construction:
/// - Must not exceed 65,535 bytes once UTF-8 encoded (the wire format's
///   text field is length-prefixed by a two-byte field)
///
/// Unlike `Username`, an empty body is permitted — the protocol itself
/// places no lower bound on message content, only an upper one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextPayloadError {
    #[error("text payload cannot exceed {max} bytes (got {got})")]
    TooLong { max: usize, got: usize },
}

impl TextPayload {
    /// Maximum encoded length, per the wire format's two-byte length prefix.
    pub const MAX_LEN: usize = u16::MAX as usize;

    pub fn new(text: impl Into<String>) -> Result<Self, TextPayloadError> {
        let text = text.into();
        if text.len() > Self::MAX_LEN {
            return Err(TextPayloadError::TooLong {
                max: Self::MAX_LEN,
                got: text.len(),
            });
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TextPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TextPayload {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_valid() {
        let name = Username::new("alice").unwrap();
        assert_eq!(name.as_str(), "alice");
    }

    #[test]
    fn username_trimmed() {
        let name = Username::new("  bob  ").unwrap();
        assert_eq!(name.as_str(), "bob");
    }

    #[test]
    fn username_empty_rejected() {
        assert_eq!(Username::new(""), Err(UsernameError::Empty));
        assert_eq!(Username::new("   "), Err(UsernameError::Empty));
    }

    #[test]
    fn username_too_long_rejected() {
        let long = "a".repeat(256);
        assert!(matches!(
            Username::new(long),
            Err(UsernameError::TooLong { max: 255, got: 256 })
        ));
    }

    #[test]
    fn username_at_max_len_accepted() {
        let max = "a".repeat(255);
        assert!(Username::new(max).is_ok());
    }

    #[test]
    fn text_payload_empty_is_allowed() {
        assert!(TextPayload::new("").is_ok());
    }

    #[test]
    fn text_payload_too_long_rejected() {
        let long = "a".repeat(TextPayload::MAX_LEN + 1);
        assert!(TextPayload::new(long).is_err());
    }

    #[test]
    fn text_payload_at_max_len_accepted() {
        let max = "a".repeat(TextPayload::MAX_LEN);
        assert!(TextPayload::new(max).is_ok());
    }

    #[test]
    fn text_payload_utf8_content() {
        let text = TextPayload::new("hola, cómo estás?").unwrap();
        assert_eq!(text.as_str(), "hola, cómo estás?");
    }
}
