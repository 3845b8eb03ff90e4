//! Persona documents under `<root>/personas/`.

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use tracing::warn;

use crate::core::persona::{Persona, parse_persona};
use crate::io::paths::AgentPaths;

/// Load `<root>/personas/<name>.md`. `None` if missing or malformed.
pub fn load_persona(paths: &AgentPaths, name: &str) -> Result<Option<Persona>> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Ok(None);
    }
    let path = paths.persona(name);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    let persona = parse_persona(&raw);
    if persona.is_none() {
        warn!(path = %path.display(), "persona is missing name or description");
    }
    Ok(persona)
}

/// All well-formed personas, sorted by name.
pub fn list_personas(paths: &AgentPaths) -> Result<Vec<Persona>> {
    let entries = match fs::read_dir(&paths.personas_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", paths.personas_dir.display()));
        }
    };
    let mut personas = Vec::new();
    for entry in entries {
        let path = entry.context("read personas entry")?.path();
        if path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        match parse_persona(&raw) {
            Some(persona) => personas.push(persona),
            None => warn!(path = %path.display(), "skipping malformed persona"),
        }
    }
    personas.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(personas)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(paths: &AgentPaths, file: &str, body: &str) {
        fs::create_dir_all(&paths.personas_dir).expect("mkdir");
        fs::write(paths.personas_dir.join(file), body).expect("write");
    }

    #[test]
    fn loads_and_lists_personas() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        assert!(list_personas(&paths).expect("list").is_empty());

        write(
            &paths,
            "reviewer.md",
            "---\nname: reviewer\ndescription: Careful reviewer\nmodel: opus\n---\nReview.\n",
        );
        write(&paths, "alpha.md", "---\nname: alpha\ndescription: First\n---\nBody\n");
        write(&paths, "broken.md", "no frontmatter here\n");
        write(&paths, "notes.txt", "ignored\n");

        let names: Vec<String> = list_personas(&paths)
            .expect("list")
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["alpha", "reviewer"]);

        let reviewer = load_persona(&paths, "reviewer").expect("load").expect("found");
        assert_eq!(reviewer.model.as_deref(), Some("opus"));
        assert_eq!(reviewer.content, "Review.");
    }

    #[test]
    fn missing_or_unsafe_names_are_absent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        assert_eq!(load_persona(&paths, "nobody").expect("load"), None);
        assert_eq!(load_persona(&paths, "../etc/passwd").expect("load"), None);
    }
}
