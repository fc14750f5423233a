//! Author identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An author identifier as assigned by the collaboration backend.
///
/// Guaranteed non-empty (after trimming); everything else about its shape is
/// backend-defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthorId(String);

#[derive(Debug, Error)]
#[error("author id must not be empty")]
pub struct EmptyAuthorIdError;

impl AuthorId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyAuthorIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyAuthorIdError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for AuthorId {
    type Error = EmptyAuthorIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AuthorId {
    type Error = EmptyAuthorIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AuthorId> for String {
    fn from(value: AuthorId) -> Self {
        value.0
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presentation attributes for an author, pushed into the editing surface so
/// their edits and carets render distinctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub id: AuthorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// CSS-style color value, e.g. `"#ffe64c"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl AuthorInfo {
    #[must_use]
    pub fn new(id: AuthorId) -> Self {
        Self {
            id,
            name: None,
            color: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthorId, AuthorInfo};

    #[test]
    fn author_id_rejects_empty() {
        assert!(AuthorId::new("").is_err());
        assert!(AuthorId::new("   ").is_err());
    }

    #[test]
    fn author_id_round_trips_through_serde() {
        let id = AuthorId::new("a.xyz42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""a.xyz42""#);
        let back: AuthorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn author_id_serde_rejects_empty() {
        let parsed: Result<AuthorId, _> = serde_json::from_str(r#""""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn author_info_builders_fill_fields() {
        let info = AuthorInfo::new(AuthorId::new("a.1").unwrap())
            .with_name("Pat")
            .with_color("#ffe64c");
        assert_eq!(info.name.as_deref(), Some("Pat"));
        assert_eq!(info.color.as_deref(), Some("#ffe64c"));
    }
}
