//! Result returned when a generation run fails.

use chrono::Utc;
use serde_json::{json, Map};

use crate::models::{FileKind, GeneratedFile, OutputMetadata, StructuredOutput};
use crate::quality::{app_name_from_prompt, file_template, NameCase, DEFAULT_DEPENDENCIES};

/// Name the app after the first meaningful word of the prompt, keeping its
/// original case.
pub fn extract_app_name(prompt: &str) -> String {
    app_name_from_prompt(prompt, NameCase::Preserve, "MyApp")
}

/// Minimal, always-valid application describing a home page, a header and
/// footer, a health-check route and default design tokens.
pub fn fallback_output(prompt: &str, error: &str) -> StructuredOutput {
    let name = extract_app_name(prompt);

    let files = vec![
        GeneratedFile {
            path: "pages/index.js".to_string(),
            content: file_template(&FileKind::Page, "Home"),
            kind: FileKind::Page,
        },
        GeneratedFile {
            path: "components/Header.js".to_string(),
            content: file_template(&FileKind::Component, "Header"),
            kind: FileKind::Component,
        },
        GeneratedFile {
            path: "components/Footer.js".to_string(),
            content: file_template(&FileKind::Component, "Footer"),
            kind: FileKind::Component,
        },
        GeneratedFile {
            path: "pages/api/health.js".to_string(),
            content: file_template(&FileKind::Api, "health"),
            kind: FileKind::Api,
        },
    ];

    let mut extra = Map::new();
    extra.insert("projectType".into(), json!("fallback"));
    extra.insert("error".into(), json!(error));
    extra.insert(
        "pages".into(),
        json!([{
            "name": "Home",
            "path": "/",
            "components": ["Header", "Footer"],
            "layout": "Basic homepage layout",
            "seo": { "title": name, "description": "Generated application" }
        }]),
    );
    extra.insert(
        "components".into(),
        json!([
            { "name": "Header", "props": [], "hooks": [], "dependencies": [] },
            { "name": "Footer", "props": [], "hooks": [], "dependencies": [] }
        ]),
    );
    extra.insert(
        "contexts".into(),
        json!([{ "name": "AppContext", "state": ["loading", "user"], "actions": ["setLoading"] }]),
    );
    extra.insert(
        "apiRoutes".into(),
        json!([{ "path": "/api/health", "method": "GET", "description": "Health check" }]),
    );
    extra.insert(
        "designSystem".into(),
        json!({
            "colors": { "primary": "#3B82F6", "secondary": "#64748B" },
            "typography": { "fontFamily": "Inter, sans-serif" }
        }),
    );

    StructuredOutput {
        name,
        description: format!("Application generated from: \"{prompt}\""),
        files,
        dependencies: DEFAULT_DEPENDENCIES.iter().map(|d| d.to_string()).collect(),
        instructions: vec!["npm install".to_string(), "npm run dev".to_string()],
        images: Default::default(),
        metadata: OutputMetadata {
            fallback: true,
            error: Some(error.to_string()),
            prompt: Some(prompt.to_string()),
            generated_at: Some(Utc::now()),
            ..Default::default()
        },
        extra,
    }
}
