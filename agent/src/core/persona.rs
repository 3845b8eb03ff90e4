//! Persona documents: markdown with a small `key: value` frontmatter.
//!
//! ```text
//! ---
//! name: reviewer
//! description: Careful code reviewer
//! model: opus
//! ---
//! You review code...
//! ```

use std::sync::LazyLock;

use regex::Regex;

static DOCUMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^---\r?\n((?s:.*?))\r?\n---(?:\r?\n)?((?s:.*))$").expect("valid persona regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub description: String,
    /// Model shortcut to use when the caller does not pick one.
    pub model: Option<String>,
    /// Body text, prepended to the task instructions.
    pub content: String,
}

/// Parse a persona document. `name` and `description` are required.
pub fn parse_persona(raw: &str) -> Option<Persona> {
    let caps = DOCUMENT_RE.captures(raw)?;
    let frontmatter = caps.get(1)?.as_str();
    let content = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();

    let name = frontmatter_value(frontmatter, "name")?;
    let description = frontmatter_value(frontmatter, "description")?;
    let model = frontmatter_value(frontmatter, "model");

    Some(Persona {
        name,
        description,
        model,
        content,
    })
}

fn frontmatter_value(frontmatter: &str, key: &str) -> Option<String> {
    frontmatter.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        if k.trim() != key {
            return None;
        }
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    })
}
