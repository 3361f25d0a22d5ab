//! Prompt template management
//!
//! Templates are `.txt` files under one directory, mirrored in memory.
//! Lookups and listing run against the in-memory copy; adding a template
//! writes through to disk. All iteration is lexicographic by file name, so
//! prefix lookup and listing are deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

pub mod defaults;

pub use defaults::{seed_default_templates, DEFAULT_TEMPLATE};

const TEMPLATE_EXTENSION: &str = "txt";

/// Manager for one directory of prompt templates.
#[derive(Debug, Clone)]
pub struct PromptTemplateManager {
    template_dir: PathBuf,
    templates: BTreeMap<String, String>,
}

impl PromptTemplateManager {
    /// Create a manager over `template_dir`.
    ///
    /// The directory is created if absent and missing default templates are
    /// seeded before every `.txt` file is loaded. An unusable directory is
    /// a hard error; the rest of the pipeline cannot do anything useful
    /// without prompts.
    pub fn new(template_dir: &Path) -> Result<Self> {
        defaults::seed_default_templates(template_dir)?;

        let dir_error = |source: std::io::Error| RagError::TemplateDir {
            dir: template_dir.to_path_buf(),
            source,
        };

        let mut templates = BTreeMap::new();
        for entry in fs::read_dir(template_dir).map_err(dir_error)? {
            let path = entry.map_err(dir_error)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path).map_err(dir_error)?;
            templates.insert(name.to_string(), content);
        }

        tracing::debug!(
            dir = %template_dir.display(),
            templates = templates.len(),
            "prompt templates loaded"
        );
        Ok(Self {
            template_dir: template_dir.to_path_buf(),
            templates,
        })
    }

    /// Get a template by exact file name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    /// First template whose name starts with `prefix`, lexicographically.
    pub fn get_by_prefix(&self, prefix: &str) -> Option<(&str, &str)> {
        self.templates
            .iter()
            .find(|(name, _)| name.starts_with(prefix))
            .map(|(name, content)| (name.as_str(), content.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Render a template, substituting each `{placeholder}` from `vars`.
    ///
    /// `{{` and `}}` escape literal braces. Entries in `vars` without a
    /// matching placeholder are ignored; a placeholder without a matching
    /// var is [`RagError::MissingPlaceholder`].
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self.get(name).ok_or_else(|| RagError::TemplateNotFound {
            name: name.to_string(),
        })?;
        render_str(name, template, vars)
    }

    /// Add (or replace) a template, writing it through to disk.
    ///
    /// The in-memory copy is only updated once the file write succeeds.
    pub fn add(&mut self, name: &str, content: &str) -> Result<()> {
        let path = self.template_dir.join(name);
        fs::write(&path, content).map_err(|source| RagError::TemplateWrite {
            name: name.to_string(),
            source,
        })?;
        self.templates.insert(name.to_string(), content.to_string());
        tracing::debug!(template = name, "template added");
        Ok(())
    }

    /// Template names in lexicographic order.
    pub fn list(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }
}

/// Single-pass `{placeholder}` substitution.
fn render_str(name: &str, template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    key.push(c);
                }
                // An unterminated brace can never be satisfied by vars.
                let value = vars
                    .iter()
                    .find(|(k, _)| closed && *k == key)
                    .map(|(_, v)| *v);
                match value {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(RagError::MissingPlaceholder {
                            name: name.to_string(),
                            placeholder: key,
                        })
                    }
                }
            }
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_new_seeds_and_loads_defaults() {
        let dir = tempdir().unwrap();

        let manager = PromptTemplateManager::new(dir.path()).unwrap();

        assert_eq!(manager.len(), 4);
        assert_eq!(
            manager.list(),
            vec![
                "basic_search_system_prompt.txt",
                "drift_search_system_prompt.txt",
                "global_search_system_prompt.txt",
                "local_search_system_prompt.txt",
            ]
        );
        assert!(dir.path().join(DEFAULT_TEMPLATE).exists());
    }

    #[test]
    fn test_new_keeps_operator_edits() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_TEMPLATE), "custom {context} / {question}").unwrap();

        let manager = PromptTemplateManager::new(dir.path()).unwrap();

        assert_eq!(manager.get(DEFAULT_TEMPLATE).unwrap(), "custom {context} / {question}");
    }

    #[test]
    fn test_ignores_non_txt_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "not a template").unwrap();

        let manager = PromptTemplateManager::new(dir.path()).unwrap();

        assert!(!manager.contains("notes.md"));
    }

    #[test]
    fn test_get_missing_template() {
        let dir = tempdir().unwrap();
        let manager = PromptTemplateManager::new(dir.path()).unwrap();

        assert!(manager.get("nope.txt").is_none());

        let err = manager.render("nope.txt", &[]).unwrap_err();
        assert!(matches!(err, RagError::TemplateNotFound { name } if name == "nope.txt"));
    }

    #[test]
    fn test_get_by_prefix_takes_lexicographic_first() {
        let dir = tempdir().unwrap();
        let mut manager = PromptTemplateManager::new(dir.path()).unwrap();
        manager.add("basic_extra.txt", "B {context} {question}").unwrap();

        // "basic_extra.txt" sorts before "basic_search_system_prompt.txt".
        let (name, _) = manager.get_by_prefix("basic").unwrap();
        assert_eq!(name, "basic_extra.txt");

        assert!(manager.get_by_prefix("zzz").is_none());
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let dir = tempdir().unwrap();
        let mut manager = PromptTemplateManager::new(dir.path()).unwrap();
        manager.add("t.txt", "C: {context}\nQ: {question}").unwrap();

        let rendered = manager
            .render("t.txt", &[("context", "facts"), ("question", "why?")])
            .unwrap();

        assert_eq!(rendered, "C: facts\nQ: why?");
    }

    #[test]
    fn test_render_escaped_braces_and_extra_vars() {
        let dir = tempdir().unwrap();
        let mut manager = PromptTemplateManager::new(dir.path()).unwrap();
        manager.add("t.txt", "{{json}} and {context}").unwrap();

        let rendered = manager
            .render("t.txt", &[("context", "c"), ("unused", "u")])
            .unwrap();

        assert_eq!(rendered, "{json} and c");
    }

    #[test]
    fn test_render_missing_placeholder_is_error() {
        let dir = tempdir().unwrap();
        let mut manager = PromptTemplateManager::new(dir.path()).unwrap();
        manager.add("t.txt", "needs {context} and {question}").unwrap();

        let err = manager.render("t.txt", &[("context", "only this")]).unwrap_err();

        assert!(matches!(
            err,
            RagError::MissingPlaceholder { placeholder, .. } if placeholder == "question"
        ));
    }

    #[test]
    fn test_render_unterminated_brace_is_error() {
        let dir = tempdir().unwrap();
        let mut manager = PromptTemplateManager::new(dir.path()).unwrap();
        manager.add("t.txt", "broken {context").unwrap();

        assert!(manager.render("t.txt", &[("context", "c")]).is_err());
    }

    #[test]
    fn test_add_writes_through() {
        let dir = tempdir().unwrap();
        {
            let mut manager = PromptTemplateManager::new(dir.path()).unwrap();
            manager.add("team.txt", "T {context} {question}").unwrap();
        }

        // A fresh manager over the same directory sees the addition.
        let reloaded = PromptTemplateManager::new(dir.path()).unwrap();
        assert_eq!(reloaded.get("team.txt").unwrap(), "T {context} {question}");
    }

    #[test]
    fn test_add_failure_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("templates");
        let mut manager = PromptTemplateManager::new(&nested).unwrap();
        fs::remove_dir_all(&nested).unwrap();

        let err = manager.add("late.txt", "content").unwrap_err();

        assert!(matches!(err, RagError::TemplateWrite { .. }));
        assert!(!manager.contains("late.txt"));
    }

    #[test]
    fn test_unusable_template_dir_fails_fast() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "a plain file where a directory must go").unwrap();

        let err = PromptTemplateManager::new(&blocker).unwrap_err();

        assert!(matches!(err, RagError::TemplateDir { .. } | RagError::TemplateWrite { .. }));
    }
}
