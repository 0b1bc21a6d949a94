//! Markdown to HTML.
//!
//! `pulldown-cmark` does the parsing; two event adapters run on top:
//!
//! - [`HeadingIds`] gives headings without an explicit `{#id}` a slug id
//! - [`Highlighter`] turns fenced code with a language tag into classed spans

use deunicode::deunicode;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use rustc_hash::FxHashSet;
use std::{collections::VecDeque, sync::LazyLock};
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Convert Markdown to an HTML fragment.
pub fn to_html(markdown: &str) -> String {
    let events: Vec<_> = Parser::new_ext(markdown, options()).collect();
    let reserved = explicit_ids(&events);
    let events = Highlighter::new(HeadingIds::new(events.into_iter(), reserved));

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

// ============================================================================
// Heading Anchors
// ============================================================================

/// URL fragment for a heading: ASCII-folded, lowercase, dash-separated.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text).to_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() { "section".into() } else { slug.into() }
}

/// Every `{#id}` written in the document, wherever it appears.
fn explicit_ids(events: &[Event<'_>]) -> FxHashSet<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect()
}

struct HeadingIds<'a, I: Iterator<Item = Event<'a>>> {
    stack: VecDeque<Event<'a>>,
    seen: FxHashSet<String>,
    inner: I,
}

impl<'a, I: Iterator<Item = Event<'a>>> HeadingIds<'a, I> {
    fn new(inner: I, reserved: FxHashSet<String>) -> Self {
        Self {
            stack: VecDeque::with_capacity(4),
            seen: reserved,
            inner,
        }
    }

    /// First free id among `slug`, `slug-1`, `slug-2`, ...
    fn unique(&mut self, slug: String) -> String {
        let mut id = slug.clone();
        let mut n = 0;
        while self.seen.contains(&id) {
            n += 1;
            id = format!("{slug}-{n}");
        }
        self.seen.insert(id.clone());
        id
    }
}

impl<'a, I: Iterator<Item = Event<'a>>> Iterator for HeadingIds<'a, I> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.stack.pop_front() {
            return Some(event);
        }

        match self.inner.next()? {
            Event::Start(Tag::Heading { level, id: None, classes, attrs }) => {
                let mut text = String::new();
                loop {
                    let event = self.inner.next()?;
                    if let Event::Text(ref s) | Event::Code(ref s) = event {
                        text.push_str(s);
                    } else if let Event::End(TagEnd::Heading(..)) = event {
                        break;
                    }
                    self.stack.push_back(event);
                }

                let id = self.unique(slugify(&text));
                self.stack.push_back(Event::End(TagEnd::Heading(level)));
                Some(Event::Start(Tag::Heading { level, id: Some(CowStr::from(id)), classes, attrs }))
            }
            event => Some(event),
        }
    }
}

// ============================================================================
// Syntax Highlighting
// ============================================================================

struct Highlighter<I> {
    block: Option<(String, ClassedHTMLGenerator<'static>)>,
    inner: I,
}

impl<I> Highlighter<I> {
    fn new(inner: I) -> Self {
        Self { block: None, inner }
    }
}

/// Language token of a fence info string: "python title=x" → "python"
fn fence_language(info: &str) -> Option<&str> {
    info.split([' ', ',', '{'])
        .next()
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
}

/// The part of a language token that is safe inside a `class` attribute.
fn class_token(lang: &str) -> String {
    lang.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.' | '#'))
        .collect()
}

impl<'a, I: Iterator<Item = Event<'a>>> Iterator for Highlighter<I> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                    if fence_language(&info).is_some() =>
                {
                    let lang = fence_language(&info).unwrap_or_default().to_string();
                    let syntax = SYNTAX_SET
                        .find_syntax_by_token(&lang)
                        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
                    let generator = ClassedHTMLGenerator::new_with_class_style(
                        syntax,
                        &SYNTAX_SET,
                        ClassStyle::Spaced,
                    );
                    self.block = Some((lang, generator));
                }
                Event::Text(text) if self.block.is_some() => {
                    if let Some((_, generator)) = self.block.as_mut() {
                        for line in LinesWithEndings::from(&text) {
                            // Errors only arise from malformed grammars; keep going
                            let _ = generator.parse_html_for_line_which_includes_newline(line);
                        }
                    }
                }
                Event::End(TagEnd::CodeBlock) if self.block.is_some() => {
                    if let Some((lang, generator)) = self.block.take() {
                        let html = format!(
                            "<pre><code class=\"language-{}\">{}</code></pre>\n",
                            class_token(&lang),
                            generator.finalize()
                        );
                        return Some(Event::Html(html.into()));
                    }
                }
                event => return Some(event),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_markdown() {
        let html = to_html("Some *emphasis* and ~~strike~~.");
        assert!(html.contains("<em>emphasis</em>"));
        assert!(html.contains("<del>strike</del>"));
    }

    #[test]
    fn test_smart_punctuation() {
        let html = to_html("\"quoted\" -- dash");
        assert!(html.contains('\u{201c}'));
        assert!(html.contains('\u{2013}'));
    }

    #[test]
    fn test_tables() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>2</td>"));
    }

    #[test]
    fn test_heading_ids() {
        let html = to_html("# Über Uns\n\n## Notes\n\n## Notes\n\n## Custom {#mine}\n");
        assert!(html.contains(r#"<h1 id="uber-uns">"#));
        assert!(html.contains(r#"<h2 id="notes">Notes</h2>"#));
        assert!(html.contains(r#"<h2 id="notes-1">Notes</h2>"#));
        assert!(html.contains(r#"<h2 id="mine">Custom</h2>"#));
    }

    #[test]
    fn test_generated_ids_skip_taken_slugs() {
        let html = to_html("## Notes 1\n\n## Notes\n\n## Notes\n");
        assert!(html.contains(r#"<h2 id="notes-1">Notes 1</h2>"#));
        assert!(html.contains(r#"<h2 id="notes">Notes</h2>"#));
        assert!(html.contains(r#"<h2 id="notes-2">Notes</h2>"#));
    }

    #[test]
    fn test_later_explicit_id_is_reserved() {
        let html = to_html("## Intro\n\n## Other {#intro}\n");
        assert!(html.contains(r#"<h2 id="intro-1">Intro</h2>"#));
        assert!(html.contains(r#"<h2 id="intro">Other</h2>"#));
    }

    #[test]
    fn test_footnotes_have_no_rule() {
        let html = to_html("Claim.[^1]\n\n[^1]: Source.\n");
        assert!(html.contains("footnote-reference"));
        assert!(html.contains("footnote-definition"));
        assert!(!html.contains("<hr"));
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let html = to_html("```rust\nfn main() {}\n```\n");
        assert!(html.starts_with("<pre><code class=\"language-rust\">"));
        assert!(html.contains("<span class=\""));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_unknown_language_is_escaped() {
        let html = to_html("```nosuchlang\n<b>\n```\n");
        assert!(html.contains("language-nosuchlang"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_fence_language_cannot_break_attribute() {
        let html = to_html("```x\"onmouseover=alert(1)\nbody\n```\n");
        assert!(html.starts_with("<pre><code class=\"language-xonmouseoveralert1\">"));
        assert!(!html.contains("\"onmouseover"));
    }

    #[test]
    fn test_untagged_fence_is_untouched() {
        let html = to_html("```\nplain\n```\n");
        assert_eq!(html, "<pre><code>plain\n</code></pre>\n");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Spaces  "), "spaces");
        assert_eq!(slugify("!!!"), "section");
        assert_eq!(slugify("Café au lait"), "cafe-au-lait");
    }
}
