//! Page and data record types.
//!
//! A [`Page`] carries a small set of typed fields the pipeline owns, plus an
//! ordered `meta` map for everything else (front matter, propagated data).
//! When serialized for templates the two are flattened into one object.

use crate::{config::to_slash, error::{Result, SiteError}};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Page fields owned by the pipeline. Data propagation never writes these.
pub const FIXED_FIELDS: &[&str] = &[
    "id",
    "type",
    "parent",
    "source",
    "path",
    "template",
    "body",
    "rendered_body",
    "output",
    "images",
    "siblings",
];

/// Fixed fields that front matter is allowed to set.
const OVERRIDABLE_FIELDS: &[&str] = &["id", "parent", "path", "template"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Markdown,
    Notebook,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PageKind,
    /// Containing directory, `.` at the root.
    pub parent: String,
    pub source: PathBuf,
    /// Destination relative to the output directory.
    pub path: PathBuf,
    pub template: Option<String>,
    /// Markup before rendering.
    pub body: String,
    pub rendered_body: String,
    pub output: String,
    /// Notebook output images, keyed by path relative to `parent`.
    #[serde(skip)]
    pub images: BTreeMap<String, Vec<u8>>,
    pub siblings: Vec<String>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl Page {
    /// A page with fields derived from its source path.
    pub fn new(kind: PageKind, source: &Path) -> Self {
        Self {
            id: identifier(source),
            kind,
            parent: parent_of(source),
            source: PathBuf::from(to_slash(source)),
            path: PathBuf::from(to_slash(&source.with_extension("html"))),
            template: None,
            body: String::new(),
            rendered_body: String::new(),
            output: String::new(),
            images: BTreeMap::new(),
            siblings: Vec::new(),
            meta: Map::new(),
        }
    }

    /// Apply one front matter entry.
    ///
    /// `id`, `parent`, `path` and `template` replace the derived values and
    /// must be strings. Other pipeline-owned fields are ignored.
    pub fn set_front_matter(&mut self, key: String, value: Value) -> Result<()> {
        if !FIXED_FIELDS.contains(&key.as_str()) {
            self.meta.insert(key, value);
            return Ok(());
        }
        if !OVERRIDABLE_FIELDS.contains(&key.as_str()) {
            return Ok(());
        }

        let Value::String(text) = value else {
            return Err(SiteError::parse(
                &self.source,
                format!("front matter field `{key}` must be a string"),
            ));
        };
        match key.as_str() {
            "id" => self.id = text,
            "parent" => self.parent = text,
            "path" => self.path = PathBuf::from(text),
            "template" => self.template = Some(text),
            _ => {}
        }
        Ok(())
    }

    /// Set `key` only if the page has no value for it yet.
    ///
    /// `template` may be filled this way; other fixed fields never change.
    pub fn fill(&mut self, key: &str, value: &Value) {
        if key == "template" {
            if self.template.is_none()
                && let Value::String(name) = value
            {
                self.template = Some(name.clone());
            }
            return;
        }
        if FIXED_FIELDS.contains(&key) {
            return;
        }
        if !self.meta.contains_key(key) {
            self.meta.insert(key.to_string(), value.clone());
        }
    }

    /// Store a whole data record under `key`, replacing any previous value.
    pub fn nest(&mut self, key: &str, value: &Value) {
        if !FIXED_FIELDS.contains(&key) {
            self.meta.insert(key.to_string(), value.clone());
        }
    }

    pub fn save_as(&self) -> Option<&str> {
        self.meta.get("save_as").and_then(Value::as_str)
    }
}

/// Structured data loaded from a JSON, YAML or BibTeX file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataRecord {
    pub id: String,
    pub parent: String,
    pub source: PathBuf,
    /// A mapping for JSON/YAML files, a list of entries for bibliographies.
    pub content: Value,
}

impl DataRecord {
    pub fn new(source: &Path, content: Value) -> Self {
        Self {
            id: identifier(source),
            parent: parent_of(source),
            source: PathBuf::from(to_slash(source)),
            content,
        }
    }

    /// Filename without extension; the key nested records are stored under.
    pub fn stem(&self) -> &str {
        self.source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Index records apply to every page in their directory.
    pub fn is_index(&self) -> bool {
        self.stem() == "index"
    }
}

// ============================================================================
// Path Derivation
// ============================================================================

/// `blog/post.md` → `blog/post`
pub fn identifier(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    match source.parent().map(to_slash).filter(|p| !p.is_empty()) {
        Some(parent) => format!("{parent}/{stem}"),
        None => stem.into_owned(),
    }
}

/// `blog/post.md` → `blog`, `index.md` → `.`
pub fn parent_of(source: &Path) -> String {
    source
        .parent()
        .map(to_slash)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_and_parent() {
        assert_eq!(identifier(Path::new("blog/post.md")), "blog/post");
        assert_eq!(identifier(Path::new("a/b/c.ipynb")), "a/b/c");
        assert_eq!(identifier(Path::new("index.md")), "index");
        assert_eq!(parent_of(Path::new("blog/post.md")), "blog");
        assert_eq!(parent_of(Path::new("index.md")), ".");
    }

    #[test]
    fn test_new_page_defaults() {
        let page = Page::new(PageKind::Markdown, Path::new("blog/post.md"));
        assert_eq!(page.id, "blog/post");
        assert_eq!(page.parent, "blog");
        assert_eq!(page.source, PathBuf::from("blog/post.md"));
        assert_eq!(page.path, PathBuf::from("blog/post.html"));
        assert!(page.template.is_none());
    }

    #[test]
    fn test_front_matter_overrides() {
        let mut page = Page::new(PageKind::Markdown, Path::new("about.md"));
        page.set_front_matter("id".into(), json!("me")).unwrap();
        page.set_front_matter("template".into(), json!("page.html")).unwrap();
        page.set_front_matter("title".into(), json!("About")).unwrap();
        page.set_front_matter("body".into(), json!("ignored")).unwrap();

        assert_eq!(page.id, "me");
        assert_eq!(page.template.as_deref(), Some("page.html"));
        assert_eq!(page.meta["title"], "About");
        assert!(page.body.is_empty());
        assert!(!page.meta.contains_key("body"));
    }

    #[test]
    fn test_front_matter_rejects_non_string_fixed_field() {
        let mut page = Page::new(PageKind::Markdown, Path::new("about.md"));
        let err = page.set_front_matter("template".into(), json!(3)).unwrap_err();
        assert!(err.to_string().contains("about.md"));
    }

    #[test]
    fn test_fill_keeps_existing_values() {
        let mut page = Page::new(PageKind::Markdown, Path::new("about.md"));
        page.meta.insert("title".into(), json!("Mine"));

        page.fill("title", &json!("Theirs"));
        page.fill("author", &json!("Ada"));
        page.fill("id", &json!("hijack"));
        page.fill("template", &json!("base.html"));
        page.fill("template", &json!("other.html"));

        assert_eq!(page.meta["title"], "Mine");
        assert_eq!(page.meta["author"], "Ada");
        assert_eq!(page.id, "about");
        assert_eq!(page.template.as_deref(), Some("base.html"));
    }

    #[test]
    fn test_serialized_page_is_flat() {
        let mut page = Page::new(PageKind::Notebook, Path::new("nb/demo.ipynb"));
        page.meta.insert("title".into(), json!("Demo"));
        page.images.insert("demo_images/cell0_image.png".into(), vec![1, 2]);

        let value = serde_json::to_value(&page).unwrap();

        assert_eq!(value["type"], "notebook");
        assert_eq!(value["title"], "Demo");
        assert_eq!(value["path"], "nb/demo.html");
        assert!(value.get("images").is_none());
    }

    #[test]
    fn test_data_record_index() {
        let record = DataRecord::new(Path::new("blog/index.yml"), json!({}));
        assert!(record.is_index());
        assert_eq!(record.id, "blog/index");
        assert_eq!(record.parent, "blog");

        let record = DataRecord::new(Path::new("people.json"), json!([]));
        assert!(!record.is_index());
        assert_eq!(record.stem(), "people");
        assert_eq!(record.parent, ".");
    }
}
