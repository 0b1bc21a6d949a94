//! Template environments.
//!
//! Two dialects share one templates directory:
//!
//! | Dialect | Used for                         | Blocks      | Variables   | Comments            |
//! |---------|----------------------------------|-------------|-------------|---------------------|
//! | HTML    | page bodies, non-LaTeX templates | `{% %}`     | `{{ }}`     | `{# #}`             |
//! | LaTeX   | `.tex` / `.latex` templates      | `[# #]`     | `[- -]`     | `%# #%`, `%%` lines |
//!
//! Both error on undefined variables and never auto-escape.

use crate::error::{Result, SiteError};
use minijinja::{
    AutoEscape, Environment, ErrorKind, UndefinedBehavior, Value, path_loader,
    syntax::SyntaxConfig,
};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Html,
    Latex,
}

impl Dialect {
    /// Pick the dialect from a template file name.
    pub fn of(template: &str) -> Self {
        match Path::new(template).extension().and_then(|e| e.to_str()) {
            Some("tex" | "latex") => Self::Latex,
            _ => Self::Html,
        }
    }
}

pub struct Templates {
    html: Environment<'static>,
    latex: Environment<'static>,
}

impl Templates {
    pub fn new(dir: &Path) -> Result<Self> {
        let html = environment(dir);

        let mut latex = environment(dir);
        let syntax = SyntaxConfig::builder()
            .block_delimiters("[#", "#]")
            .variable_delimiters("[-", "-]")
            .comment_delimiters("%#", "#%")
            .line_comment_prefix("%%")
            .build()
            .map_err(|err| SiteError::Template {
                page: String::new(),
                message: format!("invalid LaTeX syntax config: {err}"),
            })?;
        latex.set_syntax(syntax);
        latex.set_trim_blocks(true);
        latex.set_keep_trailing_newline(true);

        Ok(Self { html, latex })
    }

    /// Evaluate a page body as a template (default delimiters).
    pub fn render_body(&self, page: &str, body: &str, ctx: Value) -> Result<String> {
        self.html
            .render_named_str(page, body, ctx)
            .map_err(|err| template_error(page, &err))
    }

    /// Render the named template file with `ctx`.
    pub fn render_page(&self, page: &str, template: &str, ctx: Value) -> Result<String> {
        let env = match Dialect::of(template) {
            Dialect::Html => &self.html,
            Dialect::Latex => &self.latex,
        };
        let tmpl = env.get_template(template).map_err(|err| {
            if err.kind() == ErrorKind::TemplateNotFound {
                SiteError::MissingTemplate {
                    page: page.to_string(),
                    reason: format!("template `{template}` not found"),
                }
            } else {
                template_error(page, &err)
            }
        })?;
        tmpl.render(ctx).map_err(|err| template_error(page, &err))
    }
}

fn environment(dir: &Path) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(path_loader(dir));
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env
}

fn template_error(page: &str, err: &minijinja::Error) -> SiteError {
    let mut message = err.to_string();
    if let Some(detail) = err.detail()
        && !message.contains(detail)
    {
        message = format!("{message} ({detail})");
    }
    SiteError::Template {
        page: page.to_string(),
        message,
    }
}
