//! `serve` section configuration.
//!
//! Contains development server settings.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `serve` section in the config file - development server settings.
///
/// # Example
/// ```yaml
/// serve:
///   interface: 0.0.0.0  # Listen on all interfaces
///   port: 3000
///   watch: true         # Rebuild on file changes
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// First HTTP port tried (default: 5500).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Number of successive ports tried before giving up.
    #[serde(default = "defaults::serve::port_attempts")]
    #[educe(Default = defaults::serve::PORT_ATTEMPTS)]
    pub port_attempts: u16,

    /// Rebuild on source changes.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_serve_config() {
        let config = r#"
            serve:
              interface: 0.0.0.0
              port: 8080
              watch: false
        "#;
        let config: SiteConfig = serde_yaml::from_str(config).unwrap();

        assert_eq!(config.serve.interface, "0.0.0.0");
        assert_eq!(config.serve.port, 8080);
        assert!(!config.serve.watch);
    }

    #[test]
    fn test_serve_config_defaults() {
        let config: SiteConfig = serde_yaml::from_str("title: Test").unwrap();

        assert_eq!(config.serve.interface, "127.0.0.1");
        assert_eq!(config.serve.port, 5500);
        assert_eq!(config.serve.port_attempts, 10);
        assert!(config.serve.watch);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            serve:
              unknown_field: should_fail
        "#;
        let result: Result<SiteConfig, _> = serde_yaml::from_str(config);

        assert!(result.is_err());
    }

    #[test]
    fn test_serve_config_partial_override() {
        let config = r#"
            serve:
              port: 3000
        "#;
        let config: SiteConfig = serde_yaml::from_str(config).unwrap();

        assert_eq!(config.serve.port, 3000);
        assert_eq!(config.serve.interface, "127.0.0.1");
        assert!(config.serve.watch);
    }
}
