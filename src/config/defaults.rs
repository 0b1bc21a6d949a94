//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

use std::path::PathBuf;

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

// ============================================================================
// Top-level Defaults
// ============================================================================

pub fn config_file() -> PathBuf {
    "config.yml".into()
}

pub fn root() -> PathBuf {
    ".".into()
}

pub fn output_dir() -> PathBuf {
    "_build".into()
}

pub fn templates_dir() -> PathBuf {
    "_templates".into()
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5500
    }

    /// Successive ports tried when the default port is taken.
    pub const PORT_ATTEMPTS: u16 = 10;

    pub fn port_attempts() -> u16 {
        PORT_ATTEMPTS
    }
}
