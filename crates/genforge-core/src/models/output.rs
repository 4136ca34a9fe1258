//! The generated-artifact shape returned to callers and stored in the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form key/value metadata attached to requests, jobs and cache entries.
pub type Metadata = Map<String, Value>;

/// A generated application: files plus setup information.
///
/// Unknown top-level keys emitted by the generator (architecture notes,
/// scripts, fallback blueprints) are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredOutput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_files")]
    pub files: Vec<GeneratedFile>,
    #[serde(default, deserialize_with = "string_list")]
    pub dependencies: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub instructions: Vec<String>,
    /// Image references keyed by search keyword.
    #[serde(default, deserialize_with = "lenient_images")]
    pub images: BTreeMap<String, Vec<ImageRef>>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: OutputMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StructuredOutput {
    /// True when every file has a path, content and a recognized type.
    pub fn is_valid(&self) -> bool {
        self.files.iter().all(GeneratedFile::is_valid)
    }

    /// Parse raw generator output.
    ///
    /// Only a document that is not a JSON object is an error; nulls and
    /// oddly typed fields fall back to their defaults.
    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// One file of a generated application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_kind")]
    pub kind: FileKind,
}

impl GeneratedFile {
    pub fn is_valid(&self) -> bool {
        !self.path.trim().is_empty() && !self.content.trim().is_empty() && self.kind.is_recognized()
    }
}

/// Declared type tag of a generated file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileKind {
    #[default]
    Component,
    Page,
    Api,
    Style,
    Config,
    Middleware,
    Hook,
    Util,
    Other(String),
}

impl FileKind {
    pub fn as_str(&self) -> &str {
        match self {
            FileKind::Component => "component",
            FileKind::Page => "page",
            FileKind::Api => "api",
            FileKind::Style => "style",
            FileKind::Config => "config",
            FileKind::Middleware => "middleware",
            FileKind::Hook => "hook",
            FileKind::Util => "util",
            FileKind::Other(tag) => tag,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, FileKind::Other(_))
    }
}

impl From<&str> for FileKind {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "component" => FileKind::Component,
            "page" => FileKind::Page,
            "api" => FileKind::Api,
            "style" => FileKind::Style,
            "config" => FileKind::Config,
            "middleware" => FileKind::Middleware,
            "hook" => FileKind::Hook,
            "util" => FileKind::Util,
            _ => FileKind::Other(tag.to_string()),
        }
    }
}

impl From<String> for FileKind {
    fn from(tag: String) -> Self {
        FileKind::from(tag.as_str())
    }
}

impl From<FileKind> for String {
    fn from(kind: FileKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an image returned by the enrichment collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Pipeline bookkeeping attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMetadata {
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Request metadata merged into the result.
    #[serde(flatten)]
    pub extra: Metadata,
}

/// Accepts a list of strings, an object (its keys), a single string, or null.
///
/// Generators frequently emit `dependencies` in package.json form.
fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
        other => vec![other.to_string()],
    })
}

// Generator output passes the quality engine as loosely typed JSON, so the
// typed view must accept anything the engine accepts.

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_kind<'de, D>(deserializer: D) -> std::result::Result<FileKind, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(tag) if !tag.trim().is_empty() => FileKind::from(tag),
        _ => FileKind::default(),
    })
}

/// Non-object entries are dropped; a non-array value yields no files.
fn lenient_files<'de, D>(deserializer: D) -> std::result::Result<Vec<GeneratedFile>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Keeps keyword groups that parse; anything but an object is empty.
fn lenient_images<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Vec<ImageRef>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(groups) => groups
            .into_iter()
            .filter_map(|(keyword, refs)| {
                serde_json::from_value::<Vec<ImageRef>>(refs)
                    .ok()
                    .map(|refs| (keyword, refs))
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn lenient_metadata<'de, D>(deserializer: D) -> std::result::Result<OutputMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_generator_output() {
        let raw = r#"{
            "name": "ShopApp",
            "description": "A store",
            "files": [{"path": "Header.js", "content": "export default function Header() {}", "type": "component"}],
            "dependencies": ["react", "next"],
            "instructions": ["npm install"],
            "architecture": {"framework": "Next.js"}
        }"#;

        let output = StructuredOutput::from_json(raw).unwrap();
        assert_eq!(output.name, "ShopApp");
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.files[0].kind, FileKind::Component);
        assert!(output.extra.contains_key("architecture"));
        assert!(output.is_valid());
    }

    #[test]
    fn test_dependencies_accept_package_json_form() {
        let output: StructuredOutput = serde_json::from_value(json!({
            "name": "x",
            "dependencies": {"react": "^18.0.0", "next": "^14.0.0"}
        }))
        .unwrap();
        assert_eq!(output.dependencies, vec!["next", "react"]);
    }

    #[test]
    fn test_unknown_file_kind_is_preserved() {
        let file: GeneratedFile =
            serde_json::from_value(json!({"path": "a.md", "content": "# hi", "type": "docs"}))
                .unwrap();
        assert_eq!(file.kind, FileKind::Other("docs".to_string()));
        assert!(!file.is_valid());
        assert_eq!(serde_json::to_value(&file).unwrap()["type"], "docs");
    }

    #[test]
    fn test_loosely_typed_fields_fall_back_to_defaults() {
        let raw = r#"{
            "name": "ShopApp",
            "description": null,
            "files": [
                {"path": "components/Cart.js", "content": "export default function Cart() {}", "type": null},
                "stray string",
                {"path": "pages/index.js", "content": "export default function Home() {}", "type": "page"}
            ],
            "images": [{"url": "https://example.com/a.jpg"}],
            "metadata": null
        }"#;

        let output = StructuredOutput::from_json(raw).unwrap();
        assert_eq!(output.name, "ShopApp");
        assert_eq!(output.description, "");
        assert_eq!(output.files.len(), 2);
        assert_eq!(output.files[0].kind, FileKind::Component);
        assert_eq!(output.files[1].kind, FileKind::Page);
        assert!(output.images.is_empty());
        assert_eq!(output.metadata, OutputMetadata::default());
        assert!(output.is_valid());
    }

    #[test]
    fn test_image_groups_that_parse_are_kept() {
        let output: StructuredOutput = serde_json::from_value(json!({
            "name": "x",
            "images": {
                "shoes": [{"url": "https://example.com/s.jpg", "alt": "shoe"}],
                "broken": "not a list"
            }
        }))
        .unwrap();
        assert_eq!(output.images.len(), 1);
        assert_eq!(output.images["shoes"][0].alt.as_deref(), Some("shoe"));
    }

    #[test]
    fn test_non_object_document_is_an_error() {
        assert!(StructuredOutput::from_json("[1, 2]").is_err());
        assert!(StructuredOutput::from_json("not json").is_err());
    }

    #[test]
    fn test_metadata_flattens_request_fields() {
        let mut metadata = OutputMetadata {
            fallback: true,
            error: Some("boom".to_string()),
            ..Default::default()
        };
        metadata.extra.insert("domain".to_string(), json!("ecommerce"));

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["fallback"], true);
        assert_eq!(value["domain"], "ecommerce");
        assert_eq!(value["error"], "boom");
    }
}
