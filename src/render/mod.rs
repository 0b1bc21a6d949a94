//! Render pipeline.
//!
//! ```text
//! render()
//!     ├── expand bodies      markdown bodies evaluated as templates
//!     ├── convert markup     Markdown → HTML, pages in parallel
//!     └── apply templates    `page.template` wraps the HTML
//! ```
//!
//! Every pass sees `{page, site, config, build}`. `site` is a snapshot taken
//! when the pass starts, so pages rendered later in a pass never observe
//! changes made earlier in the same pass.

pub mod markdown;
pub mod template;

use crate::{
    build::BuildInfo,
    config::SiteConfig,
    error::{Result, SiteError},
    log,
    site::{Site, page::PageKind},
};
use minijinja::{Value, context};
use rayon::prelude::*;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use template::Templates;

/// Run all three passes over `site`.
pub fn render(site: &mut Site, config: &SiteConfig, build: &BuildInfo) -> Result<()> {
    let templates = Templates::new(&config.templates_path())?;

    expand_bodies(site, &templates, config, build)?;
    convert_markup(site);
    apply_templates(site, &templates, config, build)?;

    log!("render"; "rendered {} pages", site.pages.len());
    Ok(())
}

/// Evaluate each markdown body as a template.
pub fn expand_bodies(
    site: &mut Site,
    templates: &Templates,
    config: &SiteConfig,
    build: &BuildInfo,
) -> Result<()> {
    let snapshot = Snapshot::take(site);

    for page in site.pages.values_mut() {
        if page.kind != PageKind::Markdown {
            continue;
        }
        let ctx = snapshot.context(&page.id, config, build);
        page.body = templates.render_body(&page.id, &page.body, ctx)?;
    }
    Ok(())
}

/// Convert every page body to HTML.
pub fn convert_markup(site: &mut Site) {
    site.pages
        .par_iter_mut()
        .for_each(|(_, page)| page.rendered_body = markdown::to_html(&page.body));
}

/// Wrap each page's HTML in its output template.
pub fn apply_templates(
    site: &mut Site,
    templates: &Templates,
    config: &SiteConfig,
    build: &BuildInfo,
) -> Result<()> {
    let snapshot = Snapshot::take(site);

    for page in site.pages.values_mut() {
        let Some(name) = page.template.as_deref() else {
            return Err(SiteError::MissingTemplate {
                page: page.id.clone(),
                reason: "no `template` field".into(),
            });
        };
        let ctx = context! {
            body => page.rendered_body.as_str(),
            ..snapshot.context(&page.id, config, build)
        };
        page.output = templates.render_page(&page.id, name, ctx)?;
    }
    Ok(())
}

// ============================================================================
// Context
// ============================================================================

/// Template view of every page at one point in time.
struct Snapshot {
    pages: BTreeMap<String, Value>,
    site: Value,
}

impl Snapshot {
    fn take(site: &Site) -> Self {
        let flat: BTreeMap<&str, Json> = site
            .pages
            .values()
            .map(|page| {
                let value = serde_json::to_value(page).unwrap_or(Json::Null);
                (page.id.as_str(), value)
            })
            .collect();

        let pages: BTreeMap<String, Value> = site
            .pages
            .values()
            .map(|page| {
                let mut view = flat.get(page.id.as_str()).cloned().unwrap_or(Json::Null);
                if let Json::Object(map) = &mut view {
                    let siblings = page
                        .siblings
                        .iter()
                        .filter_map(|id| flat.get(id.as_str()).cloned())
                        .collect();
                    map.insert("siblings".into(), Json::Array(siblings));
                }
                (page.id.clone(), Value::from_serialize(&view))
            })
            .collect();

        let site = Value::from_serialize(&pages);
        Self { pages, site }
    }

    fn context(&self, id: &str, config: &SiteConfig, build: &BuildInfo) -> Value {
        let page = self
            .pages
            .get(id)
            .cloned()
            .unwrap_or_else(|| Value::from_serialize(Map::new()));
        context! {
            page => page,
            site => self.site.clone(),
            config => Value::from_serialize(config),
            build => Value::from_serialize(build),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::page::Page;
    use std::{fs, path::Path};
    use tempfile::TempDir;

    fn page(source: &str, template: Option<&str>, body: &str) -> Page {
        let mut page = Page::new(PageKind::Markdown, Path::new(source));
        page.template = template.map(str::to_string);
        page.body = body.to_string();
        page
    }

    fn site_with(pages: Vec<Page>) -> Site {
        let mut site = Site::default();
        for page in pages {
            site.pages.insert(page.id.clone(), page);
        }
        crate::site::link_siblings(&mut site);
        site
    }

    fn setup(templates: &[(&str, &str)]) -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        let tdir = dir.path().join("_templates");
        fs::create_dir_all(&tdir).unwrap();
        for (name, content) in templates {
            fs::write(tdir.join(name), content).unwrap();
        }
        let config = SiteConfig {
            root: dir.path().to_path_buf(),
            ..SiteConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn test_full_render() {
        let (_dir, config) = setup(&[("page.html", "<title>{{ page.title }}</title>{{ body }}")]);
        let mut about = page("about.md", Some("page.html"), "# {{ page.title }}");
        about.meta.insert("title".into(), "About".into());
        let mut site = site_with(vec![about]);

        render(&mut site, &config, &BuildInfo::default()).unwrap();

        let about = &site.pages["about"];
        assert_eq!(about.body, "# About");
        assert_eq!(about.rendered_body, "<h1 id=\"about\">About</h1>\n");
        assert_eq!(about.output, "<title>About</title><h1 id=\"about\">About</h1>\n");
    }

    #[test]
    fn test_siblings_resolved_to_pages() {
        let (_dir, config) = setup(&[(
            "list.html",
            "{% for s in page.siblings %}{{ s.id }}={{ s.path }};{% endfor %}",
        )]);
        let mut site = site_with(vec![
            page("blog/a.md", Some("list.html"), ""),
            page("blog/b.md", Some("list.html"), ""),
            page("blog/c.md", Some("list.html"), ""),
        ]);

        render(&mut site, &config, &BuildInfo::default()).unwrap();

        assert_eq!(
            site.pages["blog/b"].output,
            "blog/a=blog/a.html;blog/c=blog/c.html;"
        );
    }

    #[test]
    fn test_body_sees_site_and_config() {
        let (_dir, mut config) = setup(&[("page.html", "{{ body }}")]);
        config.extra.insert("title".into(), "Lab".into());
        let mut site = site_with(vec![
            page("index.md", Some("page.html"), "{{ config.title }}: {{ site['news'].id }}"),
            page("news.md", Some("page.html"), "news"),
        ]);

        render(&mut site, &config, &BuildInfo::default()).unwrap();

        assert_eq!(site.pages["index"].body, "Lab: news");
    }

    #[test]
    fn test_notebook_body_is_not_expanded() {
        let (_dir, config) = setup(&[("page.html", "{{ body }}")]);
        let mut nb = Page::new(PageKind::Notebook, Path::new("nb.ipynb"));
        nb.template = Some("page.html".into());
        nb.body = "```\n{{ x }}\n```".into();
        let mut site = site_with(vec![nb]);

        render(&mut site, &config, &BuildInfo::default()).unwrap();

        assert!(site.pages["nb"].output.contains("{{ x }}"));
    }

    #[test]
    fn test_missing_template_field_names_page() {
        let (_dir, config) = setup(&[]);
        let mut site = site_with(vec![page("blog/untitled.md", None, "x")]);

        let err = render(&mut site, &config, &BuildInfo::default()).unwrap_err();

        assert!(matches!(err, SiteError::MissingTemplate { ref page, .. } if page == "blog/untitled"));
    }

    #[test]
    fn test_undefined_variable_in_body_fails() {
        let (_dir, config) = setup(&[("page.html", "{{ body }}")]);
        let mut site = site_with(vec![page("a.md", Some("page.html"), "{{ page.nope }}")]);

        let err = render(&mut site, &config, &BuildInfo::default()).unwrap_err();

        assert!(matches!(err, SiteError::Template { .. }));
    }
}
