//! Loading documents for ingestion

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use docindex_engine::Document;

/// Read documents from `path`.
///
/// `.json` files hold an array of `{"content": ..., "metadata": {...}}`
/// objects. Anything else is read as text and split into one document per
/// paragraph.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
        return serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a JSON array of documents", path.display()));
    }

    let source = path.display().to_string();
    Ok(split_paragraphs(&raw)
        .into_iter()
        .map(|paragraph| Document::new(paragraph).with_metadata("source", source.clone()))
        .collect())
}

/// Non-empty blocks of text separated by blank lines
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Group id derived from a file name: `notes/Q3 report.md` becomes `q3-report`
pub fn group_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let slug: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    (!slug.is_empty()).then_some(slug)
}
