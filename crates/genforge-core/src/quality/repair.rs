//! Issue detection and local repair of generator output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::evaluate::{file_stem, is_truthy, parse_object};
use super::templates::{file_template, pascal_identifier};
use super::types::{IssueKind, QualityIssue, RepairOutcome, Severity};
use crate::models::FileKind;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex must compile"));

static UNQUOTED_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_$][\w$]*)(\s*:)").expect("unquoted key regex must compile")
});

/// Words that describe the request rather than the app.
const NAME_STOP_WORDS: &[&str] = &[
    "create",
    "build",
    "make",
    "develop",
    "website",
    "application",
    "app",
];

pub(crate) const DEFAULT_DEPENDENCIES: &[&str] = &["react", "next", "tailwindcss"];

/// Enumerate concrete defects in raw output, in repair order.
///
/// Unparseable text yields a single critical issue and nothing else.
pub fn detect_issues(output: &str) -> Vec<QualityIssue> {
    let root = match serde_json::from_str::<Value>(output) {
        Err(e) => {
            return vec![QualityIssue::structural(
                IssueKind::JsonInvalid,
                format!("JSON structure is invalid: {e}"),
            )]
        }
        Ok(Value::Object(root)) => root,
        Ok(_) => {
            return vec![QualityIssue::structural(
                IssueKind::JsonParseError,
                "Output root is not an object",
            )]
        }
    };

    let mut issues = Vec::new();

    if !root.get("name").is_some_and(is_truthy) {
        issues.push(QualityIssue::missing_field(
            "name",
            Severity::High,
            "Application name is missing",
        ));
    }

    let files = root.get("files").and_then(Value::as_array);
    if files.is_none() {
        issues.push(QualityIssue::missing_field(
            "files",
            Severity::Critical,
            "Files array is missing or invalid",
        ));
    }

    if root.get("dependencies").map_or(true, Value::is_null) {
        issues.push(QualityIssue::missing_field(
            "dependencies",
            Severity::Medium,
            "Dependency list is missing",
        ));
    }

    for (index, file) in files.into_iter().flatten().enumerate() {
        if !file.get("path").is_some_and(is_truthy) {
            issues.push(QualityIssue::file(
                IssueKind::FileInvalid,
                index,
                "File path is missing",
            ));
        }
        if !file.get("content").is_some_and(is_truthy) {
            issues.push(QualityIssue::file(
                IssueKind::FileEmpty,
                index,
                "File content is empty",
            ));
        }
    }

    issues
}

/// Apply one fix per issue, in order, each operating on the previous result.
pub fn fix_issues(output: &str, issues: &[QualityIssue], original_prompt: &str) -> RepairOutcome {
    let mut fixed = output.to_string();
    let mut improvements = Vec::with_capacity(issues.len());

    for issue in issues {
        let (next, improvement) = fix_single_issue(&fixed, issue, original_prompt);
        debug!("Repair: {}", improvement);
        fixed = next;
        improvements.push(improvement);
    }

    RepairOutcome {
        fixed,
        improvements,
    }
}

fn fix_single_issue(output: &str, issue: &QualityIssue, original_prompt: &str) -> (String, String) {
    match issue.kind {
        IssueKind::JsonInvalid | IssueKind::JsonParseError => repair_structure(output),
        IssueKind::MissingField => match issue.field.as_deref() {
            Some(field) => fix_missing_field(output, field, original_prompt),
            None => (output.to_string(), "Skipped missing_field issue without a field".to_string()),
        },
        IssueKind::FileInvalid | IssueKind::FileEmpty => match issue.file_index {
            Some(index) => fix_file(output, index, issue.kind),
            None => (output.to_string(), format!("Skipped {} issue without a file index", issue.kind)),
        },
    }
}

/// Recover an object from malformed text, or substitute the fallback shape.
///
/// Tries, cumulatively: the outermost `{...}` region, dropping trailing
/// commas, quoting bare keys, and converting single quotes. The returned
/// text always parses to an object.
pub fn repair_structure(output: &str) -> (String, String) {
    let trimmed = output.trim();
    let mut candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    };

    let transforms: [fn(&str) -> String; 3] = [
        |s| TRAILING_COMMA.replace_all(s, "$1").into_owned(),
        |s| UNQUOTED_KEY.replace_all(s, "$1\"$2\"$3").into_owned(),
        |s| s.replace('\'', "\""),
    ];

    let mut parsed = parse_object(&candidate);
    for transform in transforms {
        if parsed.is_some() {
            break;
        }
        candidate = transform(&candidate);
        parsed = parse_object(&candidate);
    }

    match parsed {
        Some(root) => (to_pretty(&Value::Object(root)), "Fixed JSON structure".to_string()),
        None => {
            warn!("Could not recover JSON structure, substituting fallback");
            (
                to_pretty(&fallback_structure()),
                "Created fallback JSON structure".to_string(),
            )
        }
    }
}

/// Minimal valid structure used when output cannot be recovered.
pub fn fallback_structure() -> Value {
    json!({
        "name": "Generated App",
        "description": "Generated application",
        "files": [],
        "dependencies": [],
        "instructions": ["npm install", "npm run dev"]
    })
}

fn fix_missing_field(output: &str, field: &str, original_prompt: &str) -> (String, String) {
    let Some(mut root) = parse_object(output) else {
        return (output.to_string(), format!("Could not fix missing field: {field}"));
    };

    let value = match field {
        "name" => Value::String(synthesize_app_name(original_prompt)),
        "files" => Value::Array(Vec::new()),
        "dependencies" => json!(DEFAULT_DEPENDENCIES),
        other => {
            return (output.to_string(), format!("Skipped unknown missing field: {other}"));
        }
    };
    root.insert(field.to_string(), value);

    (to_pretty(&Value::Object(root)), format!("Added missing field: {field}"))
}

fn fix_file(output: &str, index: usize, kind: IssueKind) -> (String, String) {
    let Some(mut root) = parse_object(output) else {
        return (output.to_string(), format!("Could not fix file issue: {kind}"));
    };
    let Some(file) = root
        .get_mut("files")
        .and_then(Value::as_array_mut)
        .and_then(|files| files.get_mut(index))
    else {
        return (output.to_string(), format!("Could not fix file issue: {kind}"));
    };

    if !file.is_object() {
        *file = Value::Object(Map::new());
    }
    if let Value::Object(entry) = file {
        repair_file_entry(entry, index);
    }

    (to_pretty(&Value::Object(root)), format!("Fixed file issue at index {index}"))
}

fn repair_file_entry(entry: &mut Map<String, Value>, index: usize) {
    if !entry.get("path").is_some_and(is_truthy) {
        entry.insert("path".into(), Value::String(format!("Component{index}.js")));
    }

    let declared_kind = entry
        .get("type")
        .filter(|v| is_truthy(v))
        .and_then(Value::as_str)
        .map(FileKind::from);

    if !entry.get("content").is_some_and(is_truthy) {
        let kind = declared_kind.unwrap_or_default();
        let stem = entry
            .get("path")
            .and_then(Value::as_str)
            .map(file_stem)
            .unwrap_or_default();
        let fallback_name = match kind {
            FileKind::Page => "Page",
            _ => "Component",
        };
        let name = pascal_identifier(stem, fallback_name);
        entry.insert("content".into(), Value::String(file_template(&kind, &name)));
    }

    if !entry.get("type").is_some_and(is_truthy) {
        entry.insert("type".into(), Value::String(FileKind::Component.to_string()));
    }
}

/// Casing applied to the chosen word after its first letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCase {
    Lower,
    Preserve,
}

/// Build `<Word>App` from the first word of the prompt longer than three
/// characters that is not a stop word, or return `default`.
pub fn app_name_from_prompt(prompt: &str, case: NameCase, default: &str) -> String {
    prompt
        .split_whitespace()
        .map(|word| {
            let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            match case {
                NameCase::Lower => word.to_lowercase(),
                NameCase::Preserve => word,
            }
        })
        .find(|word| {
            word.chars().count() > 3 && !NAME_STOP_WORDS.contains(&word.to_lowercase().as_str())
        })
        .map(|word| {
            let mut chars = word.chars();
            let head: String = chars.next().map(|c| c.to_uppercase().collect()).unwrap_or_default();
            format!("{head}{}App", chars.as_str())
        })
        .unwrap_or_else(|| default.to_string())
}

/// Name used when repairing output that lacks one.
pub fn synthesize_app_name(prompt: &str) -> String {
    app_name_from_prompt(prompt, NameCase::Lower, "GeneratedApp")
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
