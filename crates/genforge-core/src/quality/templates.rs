//! Minimal file bodies used to fill empty generated files.

use crate::models::FileKind;

/// Turn a file stem such as `product-card` into `ProductCard`.
///
/// Falls back to `fallback` when the stem has no usable characters or would
/// not be a valid identifier.
pub(crate) fn pascal_identifier(stem: &str, fallback: &str) -> String {
    let name: String = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    match name.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => name,
        _ => fallback.to_string(),
    }
}

/// Body for an empty file of the given kind.
///
/// Components and pages are named after `name`. Kinds without a dedicated
/// template get the component template.
pub(crate) fn file_template(kind: &FileKind, name: &str) -> String {
    match kind {
        FileKind::Page => format!(
            r#"import React from 'react';
import Head from 'next/head';

export default function {name}() {{
  return (
    <>
      <Head>
        <title>{name}</title>
      </Head>
      <div className="container mx-auto p-4 md:p-8">
        <h1 className="text-3xl font-bold">{name}</h1>
      </div>
    </>
  );
}}
"#
        ),
        FileKind::Api => r#"export default async function handler(req, res) {
  try {
    if (req.method === 'GET') {
      res.status(200).json({ message: 'API endpoint' });
    } else {
      res.status(405).json({ error: 'Method not allowed' });
    }
  } catch (error) {
    res.status(500).json({ error: error.message });
  }
}
"#
        .to_string(),
        FileKind::Style => "@tailwind base;\n@tailwind components;\n@tailwind utilities;\n".to_string(),
        _ => format!(
            r#"import React from 'react';

export default function {name}() {{
  return (
    <div className="p-4">
      <h1 className="text-2xl font-bold">{name}</h1>
    </div>
  );
}}
"#
        ),
    }
}
