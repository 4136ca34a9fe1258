//! Issue and report types produced by the quality engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of defect found in generator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The text does not parse as JSON at all.
    JsonInvalid,
    /// The text parses but the root is not an object.
    JsonParseError,
    MissingField,
    /// A file entry has no path.
    FileInvalid,
    /// A file entry has no content.
    FileEmpty,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::JsonInvalid => "json_invalid",
            IssueKind::JsonParseError => "json_parse_error",
            IssueKind::MissingField => "missing_field",
            IssueKind::FileInvalid => "file_invalid",
            IssueKind::FileEmpty => "file_empty",
        }
    }

    /// Whether the fix for this kind rebuilds the whole structure.
    pub fn is_structural(&self) -> bool {
        matches!(self, IssueKind::JsonInvalid | IssueKind::JsonParseError)
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

/// A concrete defect, with enough context to repair it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<usize>,
    pub description: String,
}

impl QualityIssue {
    pub(crate) fn structural(kind: IssueKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Critical,
            field: None,
            file_index: None,
            description: description.into(),
        }
    }

    pub(crate) fn missing_field(
        field: &str,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind: IssueKind::MissingField,
            severity,
            field: Some(field.to_string()),
            file_index: None,
            description: description.into(),
        }
    }

    pub(crate) fn file(kind: IssueKind, index: usize, description: impl Into<String>) -> Self {
        let severity = match kind {
            IssueKind::FileInvalid => Severity::High,
            _ => Severity::Medium,
        };
        Self {
            kind,
            severity,
            field: None,
            file_index: Some(index),
            description: description.into(),
        }
    }
}

/// Result of applying fixes to an output.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub fixed: String,
    /// One human-readable line per applied fix, in application order.
    pub improvements: Vec<String>,
}

/// Result of [`QualityEngine::enhance`](super::QualityEngine::enhance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceReport {
    pub enhanced: String,
    pub score: f64,
    pub improvements: Vec<String>,
    /// Number of detect-and-fix passes that ran; zero when the input already
    /// met the threshold.
    pub passes: usize,
}
