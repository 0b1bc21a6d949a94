//! Errors raised while assembling and rendering a site.
//!
//! Configuration problems live in [`crate::config::ConfigError`]; everything
//! after the config is loaded reports a [`SiteError`].

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = SiteError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SiteError {
    /// Malformed front matter, data file, bibliography or notebook.
    #[error("failed to parse `{path}`: {message}")]
    Parse { path: PathBuf, message: String },

    /// Template evaluation failed for a page.
    #[error("failed to render page `{page}`: {message}")]
    Template { page: String, message: String },

    /// The page names no template, or names one that does not exist.
    #[error("page `{page}`: {reason}")]
    MissingTemplate { page: String, reason: String },

    #[error("IO error at `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SiteError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
