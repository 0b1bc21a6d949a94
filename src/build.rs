//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── crawl()      ──► SourceManifest (sorted by category)
//!     ├── assemble()   ──► Site (pages + data, merged and linked)
//!     ├── render()     ──► body expansion → markup → templates
//!     └── export()     ──► copy files, write pages and images
//! ```
//!
//! Every call starts from scratch; nothing is carried over between builds.

use crate::{
    config::SiteConfig,
    crawl::{Category, SourceManifest, crawl},
    export::{ExportStats, export},
    log,
    render::render,
    site::{Site, assemble},
};
use anyhow::{Context, Result};
use chrono::Utc;
use educe::Educe;
use serde::Serialize;
use std::{path::Path, time::Instant};

/// Facts about the build exposed to templates as `build.*`.
#[derive(Debug, Clone, Educe, Serialize)]
#[educe(Default)]
pub struct BuildInfo {
    /// UTC timestamp, RFC 3339.
    pub today: String,
    /// UTC date, `YYYY-MM-DD`.
    pub date: String,
    #[educe(Default = env!("CARGO_PKG_VERSION"))]
    pub version: &'static str,
    /// Short commit hash of the site root, if it is a git checkout.
    pub commit: Option<String>,
}

impl BuildInfo {
    pub fn capture(root: &Path) -> Self {
        let now = Utc::now();
        Self {
            today: now.to_rfc3339(),
            date: now.format("%Y-%m-%d").to_string(),
            commit: short_commit(root),
            ..Self::default()
        }
    }
}

/// Short hash of `HEAD` for the repository containing `root`.
fn short_commit(root: &Path) -> Option<String> {
    let repo = gix::discover(root).ok()?;
    let head = repo.head_id().ok()?;
    Some(head.to_hex_with_len(7).to_string())
}

/// Output of a successful build.
#[derive(Debug)]
pub struct Build {
    pub manifest: SourceManifest,
    pub site: Site,
    pub stats: ExportStats,
}

/// Crawl, assemble, render and export the whole site.
pub fn build_site(config: &SiteConfig) -> Result<Build> {
    let started = Instant::now();
    let root = &config.root;

    let manifest = crawl(root, &config.ignore, &config.copy)
        .with_context(|| format!("Failed to crawl `{}`", root.display()))?;
    log!("crawl"; "{} files: {}", manifest.len(), manifest.summary());

    let mut site = assemble(root, &manifest, config).context("Failed to load site content")?;
    if !site.collisions().is_empty() {
        log!("debug"; "{} page id collisions", site.collisions().len());
    }

    let info = BuildInfo::capture(root);
    render(&mut site, config, &info).context("Failed to render site")?;

    let output = config.output_path();
    let stats = export(&site, manifest.get(Category::Copy), root, &output)
        .with_context(|| format!("Failed to write `{}`", output.display()))?;

    log!(
        "build";
        "{} pages, {} images, {} files copied in {:.2?}",
        stats.pages_written,
        stats.images_written,
        stats.files_copied,
        started.elapsed()
    );

    Ok(Build {
        manifest,
        site,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn load(root: &Path) -> SiteConfig {
        SiteConfig::load(root, Path::new("config.yml")).unwrap()
    }

    #[test]
    fn test_build_info_defaults() {
        let info = BuildInfo::default();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(info.commit.is_none());
    }

    #[test]
    fn test_build_info_outside_git() {
        let dir = TempDir::new().unwrap();
        let info = BuildInfo::capture(dir.path());
        assert_eq!(info.date.len(), 10);
        assert!(info.today.starts_with(&info.date));
    }

    #[test]
    fn test_build_site_end_to_end() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "config.yml", "title: Lab\ncopy:\n  - _static\n");
        write(root, "_templates/page.html", "<h1>{{ config.title }}</h1>{{ body }}");
        write(root, "_static/site.css", "body {}");
        write(root, "index.md", "---\ntitle: Home\n---\nWelcome to {{ page.title }}.");
        write(root, "blog/index.yml", "template: page.html\n");
        write(root, "blog/first.md", "---\n---\nFirst post.");
        write(root, "index.json", r#"{"template": "page.html"}"#);
        write(root, "logo.svg", "<svg/>");

        let config = load(root);
        let build = build_site(&config).unwrap();

        assert_eq!(build.stats.pages_written, 2);
        assert_eq!(build.stats.files_copied, 2);

        let out = root.join("_build");
        assert_eq!(
            fs::read_to_string(out.join("index.html")).unwrap(),
            "<h1>Lab</h1><p>Welcome to Home.</p>\n"
        );
        assert!(out.join("blog/first.html").is_file());
        assert!(out.join("_static/site.css").is_file());
        assert!(out.join("logo.svg").is_file());
        assert!(!out.join("config.yml").exists());
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "config.yml", "{}\n");
        write(root, "_templates/page.html", "{% for s in page.siblings %}{{ s.id }} {% endfor %}{{ body }}");
        write(root, "index.yml", "template: page.html\n");
        write(root, "a.md", "---\n---\nA");
        write(root, "b.md", "---\n---\nB");

        let config = load(root);
        build_site(&config).unwrap();
        let first = fs::read_to_string(root.join("_build/a.html")).unwrap();
        build_site(&config).unwrap();
        let second = fs::read_to_string(root.join("_build/a.html")).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, "b <p>A</p>\n");
    }

    #[test]
    fn test_pretty_links_keep_notebook_images() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "config.yml", "pretty_links: true\n");
        write(root, "_templates/page.html", "{{ body }}");
        write(root, "index.yml", "template: page.html\n");
        let notebook = serde_json::json!({
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {},
            "cells": [{
                "cell_type": "code", "metadata": {}, "source": "plot()",
                "outputs": [{
                    "output_type": "display_data", "metadata": {},
                    "data": {"image/png": "aGVsbG8="}
                }]
            }],
        });
        write(root, "demo.ipynb", &notebook.to_string());

        build_site(&load(root)).unwrap();

        let page_dir = root.join("_build/demo");
        let html = fs::read_to_string(page_dir.join("index.html")).unwrap();
        assert!(html.contains(r#"src="../demo_images/cell0_image.png""#));
        assert_eq!(fs::read(page_dir.join("../demo_images/cell0_image.png")).unwrap(), b"hello");
    }

    #[test]
    fn test_build_fails_without_template() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "config.yml", "{}\n");
        write(root, "orphan.md", "---\n---\nno template");

        let err = build_site(&load(root)).unwrap_err();

        assert!(format!("{err:#}").contains("orphan"));
    }
}
