//! Structured data files: JSON, YAML and BibTeX.

use crate::{
    error::{Result, SiteError},
    site::page::DataRecord,
};
use biblatex::{Bibliography, ChunksExt};
use serde_json::{Map, Value};
use std::path::Path;

pub fn load_json(text: &str, rel: &Path) -> Result<DataRecord> {
    let content: Value = serde_json::from_str(text).map_err(|err| SiteError::parse(rel, err))?;
    Ok(DataRecord::new(rel, content))
}

pub fn load_yaml(text: &str, rel: &Path) -> Result<DataRecord> {
    let content: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text).map_err(|err| SiteError::parse(rel, err))?
    };
    Ok(DataRecord::new(rel, content))
}

/// A bibliography becomes a list of entries, each a flat mapping:
///
/// ```text
/// { "ID": "knuth1984", "ENTRYTYPE": "article", "title": "Literate Programming", ... }
/// ```
///
/// Field values are kept verbatim.
pub fn load_bibtex(text: &str, rel: &Path) -> Result<DataRecord> {
    let bibliography = Bibliography::parse(text).map_err(|err| SiteError::parse(rel, err))?;

    let entries = bibliography
        .iter()
        .map(|entry| {
            let mut map = Map::new();
            map.insert("ID".into(), Value::String(entry.key.clone()));
            map.insert(
                "ENTRYTYPE".into(),
                Value::String(entry.entry_type.to_string().to_lowercase()),
            );
            for (name, chunks) in &entry.fields {
                map.insert(name.clone(), Value::String(chunks.format_verbatim()));
            }
            Value::Object(map)
        })
        .collect();

    Ok(DataRecord::new(rel, Value::Array(entries)))
}
