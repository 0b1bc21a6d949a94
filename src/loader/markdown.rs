//! Markdown with YAML front matter.
//!
//! ```text
//! ---
//! title: About
//! template: page.html
//! ---
//! Body text, rendered later.
//! ```

use crate::{
    error::{Result, SiteError},
    site::page::{Page, PageKind},
};
use serde_json::{Map, Value};
use std::path::Path;

const DELIMITER: &str = "---";

pub fn load(text: &str, rel: &Path) -> Result<Page> {
    let (front, body) = split_front_matter(text.trim())
        .ok_or_else(|| SiteError::parse(rel, "missing `---` front matter delimiters"))?;

    let mut page = Page::new(PageKind::Markdown, rel);
    for (key, value) in parse_front_matter(front, rel)? {
        page.set_front_matter(key, value)?;
    }
    page.body = body.to_string();
    Ok(page)
}

/// Split into `(front matter, body)` on the first two delimiter lines.
///
/// Anything before the first delimiter is dropped.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let mut bounds = Vec::with_capacity(2);
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            bounds.push((offset, offset + line.len()));
            if bounds.len() == 2 {
                break;
            }
        }
        offset += line.len();
    }

    match bounds[..] {
        [(_, front_start), (front_end, body_start)] => {
            Some((&text[front_start..front_end], &text[body_start..]))
        }
        _ => None,
    }
}

fn parse_front_matter(front: &str, rel: &Path) -> Result<Map<String, Value>> {
    if front.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_yaml::from_str::<Value>(front).map_err(|err| SiteError::parse(rel, err))? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(SiteError::parse(rel, "front matter is not a mapping")),
    }
}
