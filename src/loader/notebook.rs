//! Jupyter notebooks (nbformat v4) converted to Markdown.
//!
//! Each code cell becomes a fenced block in the kernel language, followed by
//! a plain block of its text output and at most one display artifact. The
//! first HTML output is preferred over the first image. Image payloads are
//! decoded into `Page::images`.

use crate::{
    error::{Result, SiteError},
    site::page::{Page, PageKind},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{path::Path, sync::LazyLock};

const DEFAULT_LANGUAGE: &str = "python";
const IMAGE_CAPTION: &str = "Output of the code shown above.";

/// ANSI colour codes IPython puts in tracebacks.
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"));

// ============================================================================
// nbformat Schema (the parts we read)
// ============================================================================

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<Cell>,
    #[serde(default)]
    metadata: NotebookMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct NotebookMetadata {
    kernelspec: Option<KernelSpec>,
    language_info: Option<LanguageInfo>,
}

#[derive(Debug, Deserialize)]
struct KernelSpec {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LanguageInfo {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    cell_type: String,
    #[serde(default)]
    source: Text,
    #[serde(default)]
    metadata: CellMetadata,
    #[serde(default)]
    outputs: Vec<Output>,
}

#[derive(Debug, Default, Deserialize)]
struct CellMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
enum Output {
    Stream {
        #[serde(default)]
        text: Text,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
    ExecuteResult {
        #[serde(default)]
        data: Map<String, Value>,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
    },
    #[serde(other)]
    Other,
}

/// nbformat stores multiline strings either whole or as a list of lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Text {
    Whole(String),
    Lines(Vec<String>),
}

impl Default for Text {
    fn default() -> Self {
        Self::Whole(String::new())
    }
}

impl Text {
    fn joined(&self) -> String {
        match self {
            Self::Whole(s) => s.clone(),
            Self::Lines(lines) => lines.concat(),
        }
    }
}

/// Same as [`Text::joined`] for a loosely typed MIME bundle value.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(lines) => Some(lines.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

// ============================================================================
// Conversion
// ============================================================================

pub fn load(text: &str, rel: &Path) -> Result<Page> {
    let notebook: Notebook =
        serde_json::from_str(text).map_err(|err| SiteError::parse(rel, err))?;

    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let language = notebook_language(&notebook.metadata);

    let mut page = Page::new(PageKind::Notebook, rel);
    let mut blocks = Vec::new();

    for (index, cell) in notebook.cells.iter().enumerate() {
        let source = cell.source.joined();
        if source.trim().is_empty() || cell.metadata.tags.iter().any(|t| t == "skip") {
            continue;
        }

        match cell.cell_type.as_str() {
            "markdown" | "raw" => blocks.push(source),
            "code" => {
                blocks.push(format!("```{language}\n{source}\n```"));
                let output = CellOutput::collect(&cell.outputs, rel)?;
                if !output.text.is_empty() {
                    blocks.push(format!("```\n{}\n```", output.text.join("\n")));
                }
                match output.into_display() {
                    Some(Display::Html(html)) => blocks.push(html),
                    Some(Display::Image { ext, bytes }) => {
                        let image_path = format!("{stem}_images/cell{index}_image.{ext}");
                        blocks.push(format!("![{IMAGE_CAPTION}]({image_path})"));
                        page.images.insert(image_path, bytes);
                    }
                    None => {}
                }
            }
            _ => {}
        }
    }

    page.body = blocks.join("\n\n");
    Ok(page)
}

fn notebook_language(metadata: &NotebookMetadata) -> &str {
    metadata
        .kernelspec
        .as_ref()
        .and_then(|k| k.language.as_deref())
        .or_else(|| metadata.language_info.as_ref().and_then(|l| l.name.as_deref()))
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
}

enum Display {
    Html(String),
    Image { ext: String, bytes: Vec<u8> },
}

#[derive(Default)]
struct CellOutput {
    text: Vec<String>,
    html: Option<String>,
    image: Option<(String, Vec<u8>)>,
}

impl CellOutput {
    fn collect(outputs: &[Output], rel: &Path) -> Result<Self> {
        let mut out = Self::default();

        for output in outputs {
            match output {
                Output::Stream { text } => {
                    out.text.push(text.joined().trim_end_matches('\n').to_string());
                }
                Output::Error {
                    ename,
                    evalue,
                    traceback,
                } => {
                    out.text.push(format!("{ename}: {evalue}"));
                    let traceback = ANSI_ESCAPE.replace_all(&traceback.join("\n"), "").into_owned();
                    out.text.push(format!("Traceback:\n{traceback}"));
                }
                Output::ExecuteResult { data } | Output::DisplayData { data } => {
                    out.add_bundle(data, rel)?;
                }
                Output::Other => {}
            }
        }

        Ok(out)
    }

    fn into_display(self) -> Option<Display> {
        match (self.html, self.image) {
            (Some(html), _) => Some(Display::Html(html)),
            (None, Some((ext, bytes))) => Some(Display::Image { ext, bytes }),
            (None, None) => None,
        }
    }

    fn add_bundle(&mut self, data: &Map<String, Value>, rel: &Path) -> Result<()> {
        let html = data.get("text/html").and_then(value_text);

        if html.is_none()
            && let Some(plain) = data.get("text/plain").and_then(value_text)
        {
            self.text.push(plain);
        }

        if let Some(html) = html {
            if self.html.is_none() {
                self.html = Some(wrap_html(&html));
            }
            return Ok(());
        }
        if self.image.is_some() {
            return Ok(());
        }

        for (mime, payload) in data {
            let Some(subtype) = mime.strip_prefix("image/") else {
                continue;
            };
            let Some(payload) = value_text(payload) else {
                continue;
            };
            let (ext, bytes) = if subtype == "svg+xml" {
                ("svg".to_string(), payload.into_bytes())
            } else {
                (subtype.to_string(), decode_base64(&payload, rel)?)
            };
            self.image = Some((ext, bytes));
            break;
        }
        Ok(())
    }
}

/// Wrap an HTML output, flattening the first `<style>` block onto one line.
fn wrap_html(html: &str) -> String {
    let html = match (html.find("<style>"), html.find("</style>")) {
        (Some(start), Some(close)) if close > start => {
            let end = close + "</style>".len();
            let css = dedent(&html[start..end]).replace('\n', " ");
            format!("{}{}{}", &html[..start], css, &html[end..])
        }
        _ => html.to_string(),
    };
    format!("<div class=\"cell_output text_html\">\n{html}\n</div>")
}

/// Strip the whitespace prefix shared by all non-blank lines.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode a base64 payload, tolerating a `data:` URI prefix and line breaks.
fn decode_base64(payload: &str, rel: &Path) -> Result<Vec<u8>> {
    let encoded = payload.rsplit("base64,").next().unwrap_or(payload);
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|err| SiteError::parse(rel, format!("invalid image data: {err}")))
}
