//! Content loaders.
//!
//! Each loader is a pure function of file content and relative source path.
//! [`loader_for`] maps a crawl [`Category`] to the loader that handles it;
//! copied files have no loader.

pub mod data;
pub mod markdown;
pub mod notebook;

use crate::{
    crawl::Category,
    error::{Result, SiteError},
    site::page::{DataRecord, Page},
};
use std::{fs, path::Path};

/// Result of loading one source file.
#[derive(Debug)]
pub enum Loaded {
    Page(Page),
    Data(DataRecord),
}

pub type Loader = fn(&str, &Path) -> Result<Loaded>;

/// Look up the loader for a category.
pub fn loader_for(category: Category) -> Option<Loader> {
    let loader: Loader = match category {
        Category::Markdown => |text, rel| markdown::load(text, rel).map(Loaded::Page),
        Category::Notebook => |text, rel| notebook::load(text, rel).map(Loaded::Page),
        Category::Json => |text, rel| data::load_json(text, rel).map(Loaded::Data),
        Category::Yaml => |text, rel| data::load_yaml(text, rel).map(Loaded::Data),
        Category::Bibtex => |text, rel| data::load_bibtex(text, rel).map(Loaded::Data),
        Category::Copy => return None,
    };
    Some(loader)
}

/// Read `root/rel` and run the loader for its category.
///
/// Returns `None` for categories that are copied verbatim.
pub fn load_file(root: &Path, rel: &Path, category: Category) -> Result<Option<Loaded>> {
    let Some(loader) = loader_for(category) else {
        return Ok(None);
    };
    let full = root.join(rel);
    let text = fs::read_to_string(&full).map_err(|err| SiteError::io(&full, err))?;
    loader(&text, rel).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dispatch_by_category() {
        assert!(loader_for(Category::Markdown).is_some());
        assert!(loader_for(Category::Bibtex).is_some());
        assert!(loader_for(Category::Copy).is_none());
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("about.md"), "---\ntitle: About\n---\nHi").unwrap();
        fs::write(dir.path().join("people.json"), r#"{"lead": "Ada"}"#).unwrap();

        let loaded = load_file(dir.path(), Path::new("about.md"), Category::Markdown).unwrap();
        assert!(matches!(loaded, Some(Loaded::Page(page)) if page.id == "about"));

        let loaded = load_file(dir.path(), Path::new("people.json"), Category::Json).unwrap();
        assert!(matches!(loaded, Some(Loaded::Data(record)) if record.content["lead"] == "Ada"));

        let loaded = load_file(dir.path(), Path::new("logo.png"), Category::Copy).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_file(dir.path(), Path::new("gone.md"), Category::Markdown).unwrap_err();
        assert!(matches!(err, SiteError::Io { .. }));
    }
}
