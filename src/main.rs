//! Tapa - a no-frills static site generator for markdown, notebooks and data files.

mod build;
mod cli;
mod config;
mod crawl;
mod error;
mod export;
mod loader;
mod logger;
mod reload;
mod render;
mod serve;
mod site;
mod watch;

use anyhow::{Context, Result};
use build::build_site;
use clap::Parser;
use cli::Cli;
use config::SiteConfig;
use serve::serve_site;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::set_quiet(cli.quiet);
    logger::set_verbose(cli.verbose);

    let config = load_config(&cli)?;
    let build = build_site(&config)?;
    if build.stats.pages_written == 0 {
        log!("warn"; "no pages found under `{}`", config.root.display());
    }

    if cli.serve {
        serve_site(&config, &build)?;
    }
    Ok(())
}

/// Load and validate configuration from CLI arguments.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let mut config = SiteConfig::load(&cli.root, &cli.config)
        .with_context(|| format!("Failed to load config from `{}`", cli.root.display()))?;
    config.update_with_cli(cli);
    config.validate()?;
    Ok(config)
}
