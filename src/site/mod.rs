//! Site assembly.
//!
//! Turns a [`SourceManifest`] into a [`Site`]: pages keyed by id, data records
//! indexed by directory, and the metadata merged between them.
//!
//! # Steps
//!
//! ```text
//! assemble()
//!     ├── load pages       markdown, then notebooks (later id wins)
//!     ├── load data        json / yaml / bibtex, by source path
//!     ├── propagate        data → pages (see `propagate`)
//!     ├── destinations     `destination_path()` per page
//!     └── link siblings    pages sharing a parent
//! ```

pub mod page;

use crate::{
    config::{SiteConfig, is_contained},
    crawl::{Category, SourceManifest},
    error::{Result, SiteError},
    loader::{Loaded, load_file},
    log,
};
use page::{DataRecord, Page};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    path::{Component, Path, PathBuf},
};

/// Two sources resolved to the same page id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCollision {
    pub id: String,
    /// Source of the page that was kept (loaded later).
    pub kept: PathBuf,
    /// Source of the page that was dropped.
    pub replaced: PathBuf,
}

/// Everything loaded for one build.
#[derive(Debug, Default)]
pub struct Site {
    pub pages: BTreeMap<String, Page>,
    /// Data records grouped by parent directory.
    pub data: BTreeMap<String, Vec<DataRecord>>,
    collisions: Vec<IdCollision>,
}

impl Site {
    pub fn collisions(&self) -> &[IdCollision] {
        &self.collisions
    }

    /// Insert a page, recording a collision if its id is taken.
    fn insert_page(&mut self, page: Page) {
        if let Some(previous) = self.pages.get(&page.id) {
            let collision = IdCollision {
                id: page.id.clone(),
                kept: page.source.clone(),
                replaced: previous.source.clone(),
            };
            log!("warn"; "page id `{}` from `{}` replaces `{}`",
                 collision.id, collision.kept.display(), collision.replaced.display());
            self.collisions.push(collision);
        }
        self.pages.insert(page.id.clone(), page);
    }

    fn insert_data(&mut self, record: DataRecord) {
        self.data.entry(record.parent.clone()).or_default().push(record);
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// Load every page and data source in `manifest` and link them together.
pub fn assemble(root: &Path, manifest: &SourceManifest, config: &SiteConfig) -> Result<Site> {
    let mut site = Site::default();

    for category in Category::ALL.into_iter().filter(|c| c.is_page()) {
        for rel in manifest.get(category) {
            if let Some(Loaded::Page(page)) = load_file(root, rel, category)? {
                log!("debug"; "page `{}` from {}", page.id, rel.display());
                site.insert_page(page);
            }
        }
    }

    let mut data_sources: Vec<_> = Category::ALL
        .into_iter()
        .filter(|c| c.is_data())
        .flat_map(|cat| manifest.get(cat).iter().map(move |rel| (rel, cat)))
        .collect();
    data_sources.sort();
    for (rel, category) in data_sources {
        if let Some(Loaded::Data(record)) = load_file(root, rel, category)? {
            log!("debug"; "data `{}` from {}", record.id, rel.display());
            site.insert_data(record);
        }
    }

    propagate(&mut site);

    for page in site.pages.values_mut() {
        page.path = destination_path(
            page.save_as(),
            config.pretty_links,
            &page.id,
            &page.source,
            &page.path,
        );
        if !is_contained(&page.path) {
            return Err(SiteError::parse(
                &page.source,
                format!("output path `{}` leaves the output directory", page.path.display()),
            ));
        }
        relink_images(page);
    }

    link_siblings(&mut site);

    Ok(site)
}

/// Merge data records into pages.
///
/// A non-index record whose id matches a page applies to that page only.
/// Every other record applies to all pages in its directory.
pub fn propagate(site: &mut Site) {
    let Site { pages, data, .. } = site;

    for record in data.values().flatten() {
        if !record.is_index()
            && let Some(page) = pages.get_mut(&record.id)
        {
            apply(page, record);
            continue;
        }
        for page in pages.values_mut().filter(|p| p.parent == record.parent) {
            apply(page, record);
        }
    }
}

/// Merge (page fields win) or nest under the record's stem.
fn apply(page: &mut Page, record: &DataRecord) {
    let merge = record.is_index() || record.id == page.id;
    match &record.content {
        Value::Object(map) if merge => {
            for (key, value) in map {
                page.fill(key, value);
            }
        }
        content => page.nest(record.stem(), content),
    }
}

/// Where a page is written, relative to the output directory.
///
/// - `save_as` set: that filename, next to the source
/// - `pretty_links` and not `index`/`404`: `<id>/index.html`
/// - otherwise: `current`, by default the source with `.html`
pub fn destination_path(
    save_as: Option<&str>,
    pretty_links: bool,
    id: &str,
    source: &Path,
    current: &Path,
) -> PathBuf {
    if let Some(name) = save_as {
        return source.with_file_name(name);
    }
    let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if pretty_links && current == source.with_extension("html") && !matches!(stem, "index" | "404") {
        return PathBuf::from(id).join("index.html");
    }
    current.to_path_buf()
}

/// Point notebook image links at `<parent>/` from wherever the page is written.
fn relink_images(page: &mut Page) {
    if page.images.is_empty() {
        return;
    }
    let prefix = image_prefix(&page.path, &page.parent);
    if prefix.is_empty() {
        return;
    }
    for rel in page.images.keys() {
        page.body = page
            .body
            .replace(&format!("]({rel})"), &format!("]({prefix}{rel})"));
    }
}

/// Relative link prefix from the directory of `path` to `parent`.
///
/// `blog/demo/index.html` with parent `blog` → `../`
fn image_prefix(path: &Path, parent: &str) -> String {
    let normal = |p: &Path| -> Vec<String> {
        p.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    };
    let from = normal(path.parent().unwrap_or(Path::new("")));
    let to = normal(Path::new(parent));
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut prefix = "../".repeat(from.len() - common);
    for part in &to[common..] {
        prefix.push_str(part);
        prefix.push('/');
    }
    prefix
}

/// Give each page the sorted ids of the other pages in its directory.
pub fn link_siblings(site: &mut Site) {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for page in site.pages.values() {
        groups.entry(page.parent.clone()).or_default().push(page.id.clone());
    }

    for page in site.pages.values_mut() {
        page.siblings = groups
            .get(&page.parent)
            .into_iter()
            .flatten()
            .filter(|id| **id != page.id)
            .cloned()
            .collect();
    }
}

// ============================================================================
// Tests
// ============================================================================
