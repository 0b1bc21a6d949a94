//! Source tree discovery.
//!
//! Walks the site root and sorts every file into a [`Category`] by extension.
//!
//! # Rules
//!
//! | Rule                          | Effect                                   |
//! |-------------------------------|------------------------------------------|
//! | name starts with `.` or `_`   | entry (and its subtree) is skipped       |
//! | relative path matches ignore  | entry (and its subtree) is skipped       |
//! | listed in `copy`              | always copied, even under `_` or `.`     |
//!
//! All manifest paths are relative to the root and sorted, so two crawls of
//! the same tree produce the same manifest.

use crate::{
    config::{is_contained, to_slash},
    error::{Result, SiteError},
};
use glob::{MatchOptions, Pattern};
use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

// ============================================================================
// Category
// ============================================================================

/// What a source file is, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Markdown,
    Notebook,
    Json,
    Yaml,
    Bibtex,
    Copy,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Markdown,
        Self::Notebook,
        Self::Json,
        Self::Yaml,
        Self::Bibtex,
        Self::Copy,
    ];

    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md") => Self::Markdown,
            Some("ipynb") => Self::Notebook,
            Some("json") => Self::Json,
            Some("yml" | "yaml") => Self::Yaml,
            Some("bib") => Self::Bibtex,
            _ => Self::Copy,
        }
    }

    /// Short name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Notebook => "notebook",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Bibtex => "bibtex",
            Self::Copy => "copy",
        }
    }

    /// Pages are built from these categories.
    pub const fn is_page(self) -> bool {
        matches!(self, Self::Markdown | Self::Notebook)
    }

    /// Data records are built from these categories.
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Json | Self::Yaml | Self::Bibtex)
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// Categorized, sorted list of source files relative to the site root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceManifest {
    files: BTreeMap<Category, Vec<PathBuf>>,
}

impl SourceManifest {
    pub fn get(&self, category: Category) -> &[PathBuf] {
        self.files.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Every file in the manifest, in category then path order.
    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// One-line summary for the build log, e.g. `3 markdown, 1 yaml, 12 copy`.
    pub fn summary(&self) -> String {
        let parts: Vec<_> = Category::ALL
            .iter()
            .filter_map(|&cat| {
                let n = self.get(cat).len();
                (n > 0).then(|| format!("{n} {}", cat.name()))
            })
            .collect();
        if parts.is_empty() {
            "no files".into()
        } else {
            parts.join(", ")
        }
    }

    fn from_sets(sets: BTreeMap<Category, BTreeSet<PathBuf>>) -> Self {
        let files = sets
            .into_iter()
            .map(|(cat, set)| (cat, set.into_iter().collect()))
            .collect();
        Self { files }
    }
}

// ============================================================================
// Ignore Matching
// ============================================================================

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled ignore patterns, matched against `/`-separated relative paths.
struct IgnoreSet(Vec<Pattern>);

impl IgnoreSet {
    fn new(patterns: &[String]) -> Result<Self> {
        patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|err| SiteError::parse(p, err)))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    fn is_ignored(&self, rel: &str) -> bool {
        self.0.iter().any(|p| p.matches_with(rel, MATCH_OPTIONS))
    }
}

fn is_reserved(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

// ============================================================================
// Public API
// ============================================================================

/// Discover and categorize every source file under `root`.
///
/// `extra_copy` entries are relative to `root`; directories among them are
/// expanded to the files they contain.
pub fn crawl(root: &Path, ignore: &[String], extra_copy: &[PathBuf]) -> Result<SourceManifest> {
    if !root.is_dir() {
        return Err(SiteError::io(
            root,
            io::Error::new(io::ErrorKind::NotFound, "site root is not a directory"),
        ));
    }

    let ignore = IgnoreSet::new(ignore)?;
    let mut sets: BTreeMap<Category, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut seen = BTreeSet::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if is_reserved(&name) {
            return false;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        !ignore.is_ignored(&to_slash(rel))
    });

    for entry in walker {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = relative(root, entry.path());
        seen.insert(rel.clone());
        sets.entry(Category::of(&rel)).or_default().insert(rel);
    }

    for rel in expand_copy(root, extra_copy, &ignore)? {
        if seen.insert(rel.clone()) {
            sets.entry(Category::Copy).or_default().insert(rel);
        }
    }

    Ok(SourceManifest::from_sets(sets))
}

/// Expand configured copy paths into the files they name.
fn expand_copy(root: &Path, extra_copy: &[PathBuf], ignore: &IgnoreSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in extra_copy {
        let full = root.join(entry);
        if !is_contained(entry) {
            return Err(SiteError::io(
                full,
                io::Error::new(io::ErrorKind::InvalidInput, "copy path is outside the site root"),
            ));
        }
        if !full.exists() {
            return Err(SiteError::io(
                full,
                io::Error::new(io::ErrorKind::NotFound, "copy path does not exist"),
            ));
        }

        for item in WalkDir::new(&full) {
            let item = item.map_err(|err| walk_error(&full, err))?;
            if !item.file_type().is_file() {
                continue;
            }
            let rel = relative(root, item.path());
            if !ignore.is_ignored(&to_slash(&rel)) {
                files.push(rel);
            }
        }
    }

    Ok(files)
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    PathBuf::from(to_slash(path.strip_prefix(root).unwrap_or(path)))
}

fn walk_error(root: &Path, err: walkdir::Error) -> SiteError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("filesystem loop detected"));
    SiteError::io(path, source)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn paths(manifest: &SourceManifest, cat: Category) -> Vec<String> {
        manifest
            .get(cat)
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_category_by_extension() {
        assert_eq!(Category::of(Path::new("a.md")), Category::Markdown);
        assert_eq!(Category::of(Path::new("a.ipynb")), Category::Notebook);
        assert_eq!(Category::of(Path::new("a.json")), Category::Json);
        assert_eq!(Category::of(Path::new("a.yml")), Category::Yaml);
        assert_eq!(Category::of(Path::new("a.yaml")), Category::Yaml);
        assert_eq!(Category::of(Path::new("refs.bib")), Category::Bibtex);
        assert_eq!(Category::of(Path::new("logo.png")), Category::Copy);
        assert_eq!(Category::of(Path::new("Makefile")), Category::Copy);
    }

    #[test]
    fn test_crawl_categorizes_and_sorts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "index.md");
        touch(root, "blog/b.md");
        touch(root, "blog/a.md");
        touch(root, "blog/index.yml");
        touch(root, "notes/intro.ipynb");
        touch(root, "people.json");
        touch(root, "refs.bib");
        touch(root, "img/logo.png");

        let manifest = crawl(root, &[], &[]).unwrap();

        assert_eq!(
            paths(&manifest, Category::Markdown),
            ["blog/a.md", "blog/b.md", "index.md"]
        );
        assert_eq!(paths(&manifest, Category::Notebook), ["notes/intro.ipynb"]);
        assert_eq!(paths(&manifest, Category::Yaml), ["blog/index.yml"]);
        assert_eq!(paths(&manifest, Category::Json), ["people.json"]);
        assert_eq!(paths(&manifest, Category::Bibtex), ["refs.bib"]);
        assert_eq!(paths(&manifest, Category::Copy), ["img/logo.png"]);
        assert_eq!(manifest.len(), 8);
    }

    #[test]
    fn test_reserved_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, ".git/config");
        touch(root, "_templates/base.html");
        touch(root, "_draft.md");
        touch(root, "blog/.hidden.md");
        touch(root, "page.md");

        let manifest = crawl(root, &[], &[]).unwrap();

        assert_eq!(manifest.all().count(), 1);
        assert_eq!(paths(&manifest, Category::Markdown), ["page.md"]);
    }

    #[test]
    fn test_ignored_paths_absent_from_every_category() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "README.md");
        touch(root, "config.yml");
        touch(root, "drafts/wip.md");
        touch(root, "drafts/data.json");
        touch(root, "drafts/pic.png");
        touch(root, "blog/post.md");
        touch(root, "blog/README.md");

        let ignore = vec![
            "README.md".to_string(),
            "config.yml".to_string(),
            "drafts/**".to_string(),
        ];
        let manifest = crawl(root, &ignore, &[]).unwrap();

        let all: Vec<_> = manifest.all().map(|p| to_slash(p)).collect();
        assert_eq!(all, ["blog/README.md", "blog/post.md"]);
    }

    #[test]
    fn test_ignored_directory_is_pruned() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "vendor/lib/a.md");
        touch(root, "page.md");

        let manifest = crawl(root, &["vendor".to_string()], &[]).unwrap();

        assert_eq!(paths(&manifest, Category::Markdown), ["page.md"]);
    }

    #[test]
    fn test_extra_copy_expands_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "_static/css/site.css");
        touch(root, "_static/js/site.js");
        touch(root, "_static/notes.tmp");
        touch(root, ".nojekyll");

        let manifest = crawl(
            root,
            &["**/*.tmp".to_string()],
            &[PathBuf::from("_static"), PathBuf::from(".nojekyll")],
        )
        .unwrap();

        assert_eq!(
            paths(&manifest, Category::Copy),
            [".nojekyll", "_static/css/site.css", "_static/js/site.js"]
        );
    }

    #[test]
    fn test_extra_copy_does_not_duplicate_crawled_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "about.md");

        let manifest = crawl(root, &[], &[PathBuf::from("about.md")]).unwrap();

        assert_eq!(paths(&manifest, Category::Markdown), ["about.md"]);
        assert!(manifest.get(Category::Copy).is_empty());
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = crawl(&dir.path().join("nope"), &[], &[]).unwrap_err();
        assert!(matches!(err, SiteError::Io { .. }));
    }

    #[test]
    fn test_copy_path_outside_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let assets = TempDir::new().unwrap();
        touch(assets.path(), "site.css");
        touch(dir.path(), "page.md");

        let err = crawl(dir.path(), &[], &[assets.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, SiteError::Io { .. }));
        assert!(err.to_string().contains(&assets.path().display().to_string()));

        let err = crawl(dir.path(), &[], &[PathBuf::from("../shared")]).unwrap_err();
        assert!(matches!(err, SiteError::Io { .. }));
        assert_eq!(fs::read_to_string(assets.path().join("site.css")).unwrap(), "x");
    }

    #[test]
    fn test_missing_copy_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = crawl(dir.path(), &[], &[PathBuf::from("_static")]).unwrap_err();
        assert!(err.to_string().contains("_static"));
    }

    #[test]
    fn test_summary() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.md");
        touch(dir.path(), "b.md");
        touch(dir.path(), "c.png");

        let manifest = crawl(dir.path(), &[], &[]).unwrap();

        assert_eq!(manifest.summary(), "2 markdown, 1 copy");
        assert_eq!(SourceManifest::default().summary(), "no files");
    }
}
