//! Document content carriers.
//!
//! These types move editing payloads across the embedding boundary without
//! interpreting them. Changeset algebra, attribute pools, and the document
//! model itself live behind the backing implementation; this crate only
//! enforces the envelope invariants the surface relies on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Plain text plus its attribute run string.
///
/// The document model requires the text to end with a newline; the
/// constructor enforces it so downstream code never has to re-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAttributedText", into = "RawAttributedText")]
pub struct AttributedText {
    text: String,
    attribs: String,
}

#[derive(Debug, Error)]
#[error("attributed text must end with a newline")]
pub struct MissingNewlineError;

impl AttributedText {
    pub fn new(
        text: impl Into<String>,
        attribs: impl Into<String>,
    ) -> Result<Self, MissingNewlineError> {
        let text = text.into();
        if text.ends_with('\n') {
            Ok(Self {
                text,
                attribs: attribs.into(),
            })
        } else {
            Err(MissingNewlineError)
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn attribs(&self) -> &str {
        &self.attribs
    }
}

/// Serde surface for [`AttributedText`], kept separate so deserialization
/// still runs the newline validation.
#[derive(Serialize, Deserialize)]
struct RawAttributedText {
    text: String,
    attribs: String,
}

impl TryFrom<RawAttributedText> for AttributedText {
    type Error = MissingNewlineError;

    fn try_from(raw: RawAttributedText) -> Result<Self, Self::Error> {
        Self::new(raw.text, raw.attribs)
    }
}

impl From<AttributedText> for RawAttributedText {
    fn from(value: AttributedText) -> Self {
        Self {
            text: value.text,
            attribs: value.attribs,
        }
    }
}

/// An opaque serialized changeset.
///
/// Produced by `prepare_user_changeset` and consumed by the apply-to-base
/// operations; the coordinator never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Changeset(String);

impl Changeset {
    #[must_use]
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open character range within the document, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct SelectionRange {
    start: usize,
    end: usize,
}

#[derive(Debug, Error)]
#[error("selection range start {start} exceeds end {end}")]
pub struct RangeError {
    pub start: usize,
    pub end: usize,
}

impl SelectionRange {
    pub fn new(start: usize, end: usize) -> Result<Self, RangeError> {
        if start <= end {
            Ok(Self { start, end })
        } else {
            Err(RangeError { start, end })
        }
    }

    /// A zero-width range, used for caret placement.
    #[must_use]
    pub fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }

    #[must_use]
    pub fn start(self) -> usize {
        self.start
    }

    #[must_use]
    pub fn end(self) -> usize {
        self.end
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

#[derive(Serialize, Deserialize)]
struct RawRange {
    start: usize,
    end: usize,
}

impl TryFrom<RawRange> for SelectionRange {
    type Error = RangeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl From<SelectionRange> for RawRange {
    fn from(value: SelectionRange) -> Self {
        Self {
            start: value.start,
            end: value.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributedText, Changeset, SelectionRange};

    #[test]
    fn attributed_text_requires_trailing_newline() {
        assert!(AttributedText::new("hello", "*0+5").is_err());
        let atext = AttributedText::new("hello\n", "*0+6").unwrap();
        assert_eq!(atext.text(), "hello\n");
        assert_eq!(atext.attribs(), "*0+6");
    }

    #[test]
    fn attributed_text_deserialization_validates() {
        let bad: Result<AttributedText, _> =
            serde_json::from_str(r#"{"text":"no newline","attribs":""}"#);
        assert!(bad.is_err());

        let good: AttributedText =
            serde_json::from_str(r#"{"text":"ok\n","attribs":"*0+3"}"#).unwrap();
        assert_eq!(good.text(), "ok\n");
    }

    #[test]
    fn selection_range_rejects_inverted_bounds() {
        assert!(SelectionRange::new(5, 2).is_err());
        let range = SelectionRange::new(2, 5).unwrap();
        assert_eq!((range.start(), range.end()), (2, 5));
        assert!(!range.is_empty());
    }

    #[test]
    fn caret_is_empty() {
        assert!(SelectionRange::caret(7).is_empty());
    }

    #[test]
    fn changeset_is_transparent_in_serde() {
        let cs = Changeset::new("Z:3>2*0+2$hi");
        let json = serde_json::to_string(&cs).unwrap();
        assert_eq!(json, r#""Z:3>2*0+2$hi""#);
    }
}
