//! Built-in prompt templates
//!
//! Four default system prompts seeded into the template directory on first
//! use. Seeding is idempotent and never overwrites a file the operator has
//! edited.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::error::{RagError, Result};

/// Template a new pipeline starts with.
pub const DEFAULT_TEMPLATE: &str = "basic_search_system_prompt.txt";

static DEFAULT_TEMPLATES: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        ("basic_search_system_prompt.txt", BASIC_SEARCH),
        ("local_search_system_prompt.txt", LOCAL_SEARCH),
        ("global_search_system_prompt.txt", GLOBAL_SEARCH),
        ("drift_search_system_prompt.txt", DRIFT_SEARCH),
    ])
});

const BASIC_SEARCH: &str = r#"You are a knowledge-base assistant. Answer the user's question from the context provided below.

Working principles:
1. Answer strictly from the provided context and do not add outside information.
2. If the context is not sufficient to answer the question, say so plainly.
3. Keep the answer accurate, concise, and professional.
4. Break complex answers into clear steps.

Context:
{context}

Question:
{question}

Answer:
"#;

const LOCAL_SEARCH: &str = r#"You are a knowledge-base assistant focused on a single local index.

Working principles:
1. Answer strictly from the local index context provided below.
2. Prefer the most relevant snippets so the answer stays precise.
3. Keep the answer short and aimed directly at the question.
4. If the context does not contain the answer, say so plainly.

Local index context:
{context}

Question:
{question}

Answer:
"#;

const GLOBAL_SEARCH: &str = r#"You are a knowledge-base assistant that synthesizes information across many sources.

Working principles:
1. Consider all of the provided context together.
2. Note where snippets agree and where they contradict each other.
3. Ground the answer in that synthesis rather than any single snippet.
4. Keep the answer structured and coherent.

Corpus context:
{context}

Question:
{question}

Answer:
"#;

const DRIFT_SEARCH: &str = r#"You are a knowledge-base assistant for multi-step retrieval and reasoning tasks.

Working principles:
1. Analyze the provided context in depth.
2. Identify the relationships between key concepts and entities.
3. Reason from the context before extending beyond it.
4. Give a detailed, accurate, and well-grounded answer.

Knowledge-base context:
{context}

Question:
{question}

Answer:
"#;

/// Names of the built-in templates, lexicographically ordered.
pub fn default_template_names() -> impl Iterator<Item = &'static str> {
    DEFAULT_TEMPLATES.keys().copied()
}

/// Content of a built-in template, if `name` is one.
pub fn default_template(name: &str) -> Option<&'static str> {
    DEFAULT_TEMPLATES.get(name).copied()
}

/// Write any missing default template into `dir`, creating the directory
/// first. Existing files are left untouched.
pub fn seed_default_templates(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| RagError::TemplateDir {
        dir: dir.to_path_buf(),
        source,
    })?;

    for (name, content) in DEFAULT_TEMPLATES.iter() {
        let path = dir.join(name);
        if !path.exists() {
            fs::write(&path, content).map_err(|source| RagError::TemplateWrite {
                name: name.to_string(),
                source,
            })?;
        }
    }
    Ok(())
}
