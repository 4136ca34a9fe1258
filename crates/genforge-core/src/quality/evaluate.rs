//! Scoring heuristics for generator output.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::QualityDefaults;
use crate::models::FileKind;

static IMPORT_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+([^'";]+?)\s+from\s+['"]([^'"]+)['"]"#)
        .expect("import regex must compile")
});

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:function|class|const|let|var)\s+([A-Za-z_$][\w$]*)")
        .expect("declaration regex must compile")
});

static COMPONENT_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-zA-Z]*\.(?:js|jsx|ts|tsx)$").expect("component name regex must compile")
});

const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

const MAX_IMPORT_ISSUES: usize = 5;
const MAX_NAMING_ISSUES: usize = 3;

/// Score raw output in `[0, 10]`.
///
/// Output that does not parse, or parses to something other than an object,
/// scores [`QualityDefaults::UNPARSEABLE_SCORE`]. Otherwise the score is the
/// minimum of the field check, the per-file check and the coherence check.
pub fn evaluate(output: &str) -> f64 {
    let Some(root) = parse_object(output) else {
        return QualityDefaults::UNPARSEABLE_SCORE;
    };

    let mut score = QualityDefaults::MAX_SCORE;

    let files = root.get("files").and_then(Value::as_array);
    if !root.get("name").is_some_and(is_truthy) || files.is_none() {
        score -= 2.0;
    }

    if let Some(files) = files {
        score = score.min(file_score(files));
    }

    score = score.min(coherence_score(files.map(Vec::as_slice).unwrap_or_default()));

    score.clamp(0.0, QualityDefaults::MAX_SCORE)
}

/// Parse output whose root must be a JSON object.
pub(crate) fn parse_object(output: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(output) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// JavaScript truthiness, which is what generator output is written against.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truthy_field<'a>(file: &'a Value, key: &str) -> Option<&'a Value> {
    file.get(key).filter(|v| is_truthy(v))
}

fn file_score(files: &[Value]) -> f64 {
    let mut score = QualityDefaults::MAX_SCORE;

    for file in files {
        let (Some(_), Some(content), Some(kind)) = (
            truthy_field(file, "path"),
            truthy_field(file, "content"),
            truthy_field(file, "type"),
        ) else {
            score -= 1.0;
            continue;
        };

        let content = content.as_str().unwrap_or_default();
        let content_score = match kind.as_str().map(FileKind::from) {
            Some(FileKind::Component) => component_score(content),
            Some(FileKind::Page) => page_score(content),
            Some(FileKind::Api) => api_score(content),
            Some(FileKind::Style) => style_score(content),
            _ => 8.0,
        };
        if content_score < 8.0 {
            score -= (10.0 - content_score) * 0.2;
        }
    }

    score.max(5.0)
}

fn component_score(content: &str) -> f64 {
    let mut score: f64 = 10.0;

    if !content.contains("export default") && !content.contains("export const") {
        score -= 2.0;
    }
    if !content.contains("import React") && !content.contains("import {") {
        score -= 1.0;
    }

    let has_hooks = ["useState", "useEffect", "useContext"]
        .iter()
        .any(|hook| content.contains(hook));
    if content.contains("function ") && !has_hooks && content.len() > 200 {
        score -= 1.0;
    }

    if content.contains("className") && !content.contains("className=\"") {
        score -= 1.0;
    }

    score.max(5.0)
}

fn page_score(content: &str) -> f64 {
    let mut score: f64 = 10.0;

    if !content.contains("export default") {
        score -= 2.0;
    }
    if !content.contains("Head") && !content.contains("<title>") {
        score -= 1.0;
    }
    if content.contains("className") && !content.contains("md:") && !content.contains("lg:") {
        score -= 1.0;
    }

    score.max(5.0)
}

fn api_score(content: &str) -> f64 {
    let mut score: f64 = 10.0;

    if !content.contains("export default") && !content.contains("export async function") {
        score -= 2.0;
    }
    if !content.contains("try") || !content.contains("catch") {
        score -= 1.0;
    }

    score.max(5.0)
}

fn style_score(content: &str) -> f64 {
    if content.contains("!important") {
        9.0
    } else {
        10.0
    }
}

fn coherence_score(files: &[Value]) -> f64 {
    let score = 10.0 - import_issues(files) as f64 * 0.5 - naming_issues(files) as f64 * 0.3;
    score.max(6.0)
}

/// Last path segment without its extension.
pub(crate) fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

fn file_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.').filter(|&dot| dot > 0).map(|dot| &name[dot + 1..])
}

/// Count relative imports of names that no sibling file declares.
fn import_issues(files: &[Value]) -> usize {
    let mut known: HashSet<&str> = HashSet::new();
    for file in files {
        if let Some(path) = file.get("path").and_then(Value::as_str) {
            known.insert(file_stem(path));
        }
        if let Some(content) = file.get("content").and_then(Value::as_str) {
            known.extend(DECLARATION.captures_iter(content).filter_map(|c| c.get(1)).map(|m| m.as_str()));
        }
    }

    let mut issues = 0;
    for content in files.iter().filter_map(|f| f.get("content").and_then(Value::as_str)) {
        for import in IMPORT_STATEMENT.captures_iter(content) {
            let (Some(clause), Some(source)) = (import.get(1), import.get(2)) else {
                continue;
            };
            let source = source.as_str();
            if !source.starts_with("./") && !source.starts_with("../") {
                continue;
            }
            if file_extension(source).is_some_and(|ext| !SCRIPT_EXTENSIONS.contains(&ext)) {
                continue;
            }

            issues += imported_names(clause.as_str())
                .into_iter()
                .filter(|name| !name.contains("use") && *name != "React")
                .filter(|name| !known.contains(name))
                .count();
        }
    }

    issues.min(MAX_IMPORT_ISSUES)
}

/// Names bound by an import clause, as exported by the source module.
///
/// `Default, { a, b as c }` yields `Default`, `a`, `b`. Namespace imports
/// bind no checkable name.
fn imported_names(clause: &str) -> Vec<&str> {
    let (default_part, named_part) = match clause.find('{') {
        Some(open) => {
            let close = clause[open..]
                .find('}')
                .map_or(clause.len(), |offset| open + offset);
            (&clause[..open], Some(&clause[open + 1..close]))
        }
        None => (clause, None),
    };

    let mut names: Vec<&str> = default_part
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty() && !part.starts_with('*') && *part != "type")
        .collect();

    if let Some(named) = named_part {
        for specifier in named.split(',') {
            let specifier = specifier.trim();
            let specifier = specifier.strip_prefix("type ").unwrap_or(specifier);
            if let Some(source_name) = specifier.split_whitespace().next() {
                names.push(source_name);
            }
        }
    }

    names
}

/// Count component files whose path or content breaks naming conventions.
fn naming_issues(files: &[Value]) -> usize {
    let mut issues = 0;

    for file in files {
        if file.get("type").and_then(Value::as_str).map(FileKind::from) != Some(FileKind::Component)
        {
            continue;
        }
        let path = file.get("path").and_then(Value::as_str).unwrap_or_default();
        let content = file.get("content").and_then(Value::as_str).unwrap_or_default();

        if !path.contains('/') && !COMPONENT_FILE_NAME.is_match(path) {
            issues += 1;
        }

        let name = file_stem(path);
        if !content.contains(&format!("function {name}")) && !content.contains(&format!("const {name}")) {
            issues += 1;
        }
    }

    issues.min(MAX_NAMING_ISSUES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn good_output() -> Value {
        json!({
            "name": "ShopApp",
            "description": "A small store",
            "files": [
                {
                    "path": "components/Header.js",
                    "type": "component",
                    "content": "import React from 'react';\n\nexport default function Header() {\n  return <header className=\"p-4 md:p-8\">Shop</header>;\n}\n"
                },
                {
                    "path": "pages/index.js",
                    "type": "page",
                    "content": "import Head from 'next/head';\nimport Header from '../components/Header';\n\nexport default function Home() {\n  return (<><Head><title>Shop</title></Head><Header /><main className=\"p-4 md:p-8\">Hi</main></>);\n}\n"
                },
                {
                    "path": "pages/api/health.js",
                    "type": "api",
                    "content": "export default async function handler(req, res) {\n  try {\n    res.status(200).json({ ok: true });\n  } catch (error) {\n    res.status(500).json({ error: error.message });\n  }\n}\n"
                }
            ],
            "dependencies": ["react", "next"]
        })
    }

    #[test]
    fn test_well_formed_output_scores_full_marks() {
        assert_eq!(evaluate(&good_output().to_string()), 10.0);
    }

    #[test]
    fn test_unparseable_output_scores_three() {
        assert_eq!(evaluate("Here is your app: {name: oops"), 3.0);
        assert_eq!(evaluate("[1, 2, 3]"), 3.0);
        assert_eq!(evaluate("\"just a string\""), 3.0);
    }

    #[test]
    fn test_missing_required_fields_deducts_two() {
        let mut output = good_output();
        output.as_object_mut().unwrap().remove("name");
        assert_eq!(evaluate(&output.to_string()), 8.0);

        let no_files = json!({"name": "App"});
        assert_eq!(evaluate(&no_files.to_string()), 8.0);
    }

    #[test]
    fn test_file_score_floors_at_five() {
        let files: Vec<Value> = (0..10).map(|_| json!({"path": "a.js"})).collect();
        let output = json!({"name": "App", "files": files});
        assert_eq!(evaluate(&output.to_string()), 5.0);
    }

    #[test]
    fn test_component_heuristics() {
        assert_eq!(component_score("export default function A() {}\nimport React from 'react';"), 10.0);
        // No export, no import.
        assert_eq!(component_score("function A() { return null; }"), 7.0);
        // className via expression only.
        assert_eq!(
            component_score("import React from 'react';\nexport const A = () => <div className={s.x} />;"),
            9.0
        );
        // Everything wrong still floors at five.
        let long_body = format!("function A() {{ return <div className={{x}}>{}</div>; }}", "x".repeat(250));
        assert_eq!(component_score(&long_body), 5.0);
    }

    #[test]
    fn test_page_api_and_style_heuristics() {
        assert_eq!(page_score("export default function P() { return <div className=\"p-4\" /> }"), 8.0);
        assert_eq!(api_score("export async function GET() { return Response.json({}) }"), 9.0);
        assert_eq!(style_score(".a { color: red !important; }"), 9.0);
        assert_eq!(style_score("@tailwind base;"), 10.0);
    }

    #[test]
    fn test_low_content_score_reduces_file_score() {
        // Component content scoring 7 costs 0.6 overall.
        let files = vec![json!({
            "path": "A.js",
            "type": "component",
            "content": "function A() { return null; }"
        })];
        assert!((file_score(&files) - 9.4).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_import_counts_against_coherence() {
        let files = vec![
            json!({"path": "pages/index.js", "type": "page",
                   "content": "import { Missing, useCart } from '../components/Missing';\nimport Footer from './Footer';\nimport React from 'react';"}),
        ];
        // Missing and Footer are unknown; useCart is skipped; 'react' is not relative.
        assert_eq!(import_issues(&files), 2);
    }

    #[test]
    fn test_imports_resolve_against_declarations_and_stems() {
        let files = vec![
            json!({"path": "components/Cart.js", "type": "component",
                   "content": "export const CartItem = () => null;\nexport default function Cart() {}"}),
            json!({"path": "pages/cart.js", "type": "page",
                   "content": "import Cart, { CartItem as Item } from '../components/Cart';\nimport * as utils from '../lib/utils';\nimport styles from './cart.module.css';"}),
        ];
        assert_eq!(import_issues(&files), 0);
    }

    #[test]
    fn test_multiline_import_clause() {
        let files = vec![json!({"path": "pages/a.js", "type": "page",
            "content": "import {\n  Alpha,\n  Beta,\n} from './widgets';\n"})];
        assert_eq!(import_issues(&files), 2);
    }

    #[test]
    fn test_import_issues_are_capped() {
        let content = (0..8)
            .map(|i| format!("import Thing{i} from './thing{i}';"))
            .collect::<Vec<_>>()
            .join("\n");
        let files = vec![json!({"path": "pages/a.js", "type": "page", "content": content})];
        assert_eq!(import_issues(&files), MAX_IMPORT_ISSUES);
    }

    #[test]
    fn test_naming_issues() {
        let files = vec![
            // Lowercase bare file name and no matching declaration: two issues.
            json!({"path": "header.js", "type": "component", "content": "export default function Header() {}"}),
            // Nested path is exempt from the file name rule and declares itself.
            json!({"path": "components/Footer.jsx", "type": "component", "content": "const Footer = () => null;"}),
            // Not a component.
            json!({"path": "pages/index.js", "type": "page", "content": ""}),
        ];
        assert_eq!(naming_issues(&files), 2);
    }

    #[test]
    fn test_coherence_floor() {
        let content = (0..8)
            .map(|i| format!("import Thing{i} from './thing{i}';"))
            .collect::<Vec<_>>()
            .join("\n");
        let files = vec![
            json!({"path": "pages/a.js", "type": "page", "content": content}),
            json!({"path": "x.js", "type": "component", "content": ""}),
            json!({"path": "y.js", "type": "component", "content": ""}),
        ];
        // 10 - 5*0.5 - 3*0.3 = 6.6
        assert!((coherence_score(&files) - 6.6).abs() < 1e-9);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("components/Header.js"), "Header");
        assert_eq!(file_stem("styles/cart.module.css"), "cart.module");
        assert_eq!(file_stem("Makefile"), "Makefile");
        assert_eq!(file_stem(".env"), ".env");
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!("x")));
    }
}
