//! Structured denial causes.
//!
//! Every business rule reports failures as a [`Cause`]: a machine-readable
//! kind, a human message and the dotted path of the offending field. The
//! API server renders them as `status.details.causes`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a validation failure, matching the API server's cause types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CauseKind {
    #[serde(rename = "FieldValueRequired")]
    Required,
    #[serde(rename = "FieldValueInvalid")]
    Invalid,
    #[serde(rename = "FieldValueNotSupported")]
    NotSupported,
    #[serde(rename = "FieldValueNotFound")]
    NotFound,
    #[serde(rename = "FieldValueDuplicate")]
    Duplicate,
    #[serde(rename = "FieldValueTooLong")]
    TooLong,
}

impl CauseKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "FieldValueRequired",
            Self::Invalid => "FieldValueInvalid",
            Self::NotSupported => "FieldValueNotSupported",
            Self::NotFound => "FieldValueNotFound",
            Self::Duplicate => "FieldValueDuplicate",
            Self::TooLong => "FieldValueTooLong",
        }
    }
}

impl fmt::Display for CauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reason a request was denied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    #[serde(rename = "reason")]
    pub kind: CauseKind,
    pub message: String,
    pub field: String,
}

impl Cause {
    pub fn new(kind: CauseKind, field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: field.to_string(),
        }
    }

    pub fn required(field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(CauseKind::Required, field, message)
    }

    pub fn invalid(field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(CauseKind::Invalid, field, message)
    }

    pub fn not_supported(field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(CauseKind::NotSupported, field, message)
    }

    pub fn not_found(field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(CauseKind::NotFound, field, message)
    }

    pub fn duplicate(field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(CauseKind::Duplicate, field, message)
    }

    pub fn too_long(field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::new(CauseKind::TooLong, field, message)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Field(String),
    Index(usize),
    Key(String),
}

/// Builder for dotted field paths such as `spec.template.spec.volumes[0].name`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Start a path from a dotted root, e.g. `"spec.template.spec"`.
    pub fn new(root: &str) -> Self {
        Self {
            segments: root
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| Segment::Field(s.to_string()))
                .collect(),
        }
    }

    pub fn child(&self, name: &str) -> Self {
        self.with(Segment::Field(name.to_string()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.with(Segment::Index(index))
    }

    pub fn key(&self, key: &str) -> Self {
        self.with(Segment::Key(key.to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    fn with(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                Segment::Field(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
            }
            first = false;
        }
        Ok(())
    }
}
