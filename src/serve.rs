//! Development server with live reload support.
//!
//! A lightweight HTTP server built on `tiny_http`:
//!
//! - Static file serving from the output directory
//! - Automatic `index.html` resolution for directories
//! - Directory listing when a directory has no index
//! - Reload script injected into every served HTML page
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │   Main Thread   │   │  Watcher Thread  │   │  Reload Socket   │
//! │  (HTTP Server)  │   │  (File Monitor)  │   │  (port + 1)      │
//! └────────┬────────┘   └────────┬─────────┘   └────────┬─────────┘
//!          │                     │                      │
//!          ▼                     ▼                      ▼
//!    Serve output_dir      Rebuild site  ─────────▶  "reload"
//! ```

use crate::{
    build::Build,
    config::SiteConfig,
    log,
    reload::{ReloadServer, client_script, inject_script},
    watch::watch_site,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

// ============================================================================
// Constants - HTML Templates
// ============================================================================

/// Directory listing page. Placeholders: `{path}`, `{parent_link}`, `{entries}`.
const DIRECTORY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Index of /{path}</title>
    <style>
        body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
        ul { list-style: none; padding: 0; }
        li { padding: 0.25rem 0; }
        .icon { display: inline-block; width: 1.5rem; }
    </style>
</head>
<body>
    <h1>Index of /{path}</h1>
    <ul>
        {parent_link}
        {entries}
    </ul>
</body>
</html>
"#;

/// Shown when the output directory has nothing to list.
const WELCOME_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>{title}</title>
</head>
<body style="font-family: system-ui, sans-serif; text-align: center; margin-top: 20vh;">
    <h1>{title}</h1>
    <p>The site has no pages yet. Add a markdown file with a <code>template</code> and it will appear here.</p>
    <p><small>tapa {version}</small></p>
</body>
</html>
"#;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Per-request server state.
struct ServeState {
    root: PathBuf,
    /// Reload client script, if live reload is running.
    script: Option<String>,
}

/// Serve the output of `build`, rebuilding on change when `serve.watch` is set.
///
/// Blocks until Ctrl+C is received.
pub fn serve_site(config: &SiteConfig, build: &Build) -> Result<()> {
    let interface: IpAddr = config.serve.interface.parse()?;
    let (server, addr) = try_bind_port(interface, config.serve.port, config.serve.port_attempts)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{} ({} pages)", addr, build.site.pages.len());

    let mut state = ServeState {
        root: config.output_path(),
        script: None,
    };

    if config.serve.watch {
        let reload = match ReloadServer::start(
            interface,
            addr.port().saturating_add(1),
            config.serve.port_attempts,
        ) {
            Ok(reload) => {
                state.script = Some(client_script(reload.port()));
                Some(reload)
            }
            Err(err) => {
                log!("warn"; "live reload disabled: {err}");
                None
            }
        };
        watch_site(config, &build.manifest, reload)?;
    }

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &state) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, attempts: u16) -> Result<(Server, SocketAddr)> {
    let attempts = attempts.max(1);
    let mut last_err = None;

    for offset in 0..attempts {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                return Ok((server, addr));
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        attempts,
        base_port,
        base_port.saturating_add(attempts - 1),
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// What a request path maps to under the serve root.
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    Listing(PathBuf),
    NotFound,
}

/// Resolve a raw request URL against `root`.
///
/// Resolution order:
/// 1. Exact file match
/// 2. Directory with `index.html`
/// 3. Directory without `index.html` → listing
/// 4. Nothing found → 404
fn resolve(root: &Path, url: &str) -> (String, Resolved) {
    // Query strings such as `?t=123` are cache busters, not part of the path
    let path = url.split('?').next().unwrap_or(url);
    let decoded = urlencoding::decode(path)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let request_path = decoded.trim_matches('/').to_string();

    if request_path.split('/').any(|part| part == "..") {
        return (request_path, Resolved::NotFound);
    }

    let local = root.join(&request_path);
    let resolved = if local.is_file() {
        Resolved::File(local)
    } else if local.is_dir() {
        let index = local.join("index.html");
        if index.is_file() {
            Resolved::File(index)
        } else {
            Resolved::Listing(local)
        }
    } else {
        Resolved::NotFound
    };
    (request_path, resolved)
}

fn handle_request(request: Request, state: &ServeState) -> Result<()> {
    let (request_path, resolved) = resolve(&state.root, request.url());

    match resolved {
        Resolved::File(path) => serve_file(request, &path, state.script.as_deref()),
        Resolved::Listing(dir) => match generate_directory_listing(&dir, &request_path) {
            Ok(listing) => serve_html(request, listing),
            Err(_) => serve_not_found(request),
        },
        Resolved::NotFound => serve_not_found(request),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &'static str) -> Header {
    Header::from_bytes("Content-Type", value).expect("content types are ASCII")
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path, script: Option<&str>) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    if let Some(script) = script
        && content_type.starts_with("text/html")
    {
        let html = String::from_utf8_lossy(&content);
        return serve_html(request, inject_script(&html, script));
    }

    let response = Response::from_data(content).with_header(content_type_header(content_type));
    request.respond(response)?;
    Ok(())
}

/// Serve HTML content.
fn serve_html(request: Request, content: String) -> Result<()> {
    let response =
        Response::from_string(content).with_header(content_type_header("text/html; charset=utf-8"));
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain")],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",
        Some("tex") => "text/x-tex; charset=utf-8",

        _ => "application/octet-stream",
    }
}

// ============================================================================
// Directory Listing
// ============================================================================

/// Generate an HTML directory listing.
///
/// Hidden entries are skipped; files of every type are listed after
/// directories. An empty directory gets the welcome page instead.
fn generate_directory_listing(dir_path: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries: Vec<(bool, String)> = fs::read_dir(dir_path)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                return None;
            }
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            Some((!is_dir, name))
        })
        .collect();

    if entries.is_empty() {
        return Ok(WELCOME_TEMPLATE
            .replace("{title}", "Welcome")
            .replace("{version}", env!("CARGO_PKG_VERSION")));
    }
    entries.sort();

    let items: Vec<String> = entries
        .into_iter()
        .map(|(is_file, name)| {
            let icon = if is_file { "📄" } else { "📁" };
            let href = if request_path.is_empty() {
                format!("/{name}")
            } else {
                format!("/{request_path}/{name}")
            };
            format!(r#"<li><span class="icon">{icon}</span><a href="{href}">{name}</a></li>"#)
        })
        .collect();

    let parent_link = if request_path.is_empty() {
        String::new()
    } else {
        let parent = Path::new(request_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(r#"<li class="parent"><span class="icon">📂</span><a href="/{parent}">..</a></li>"#)
    };

    #[allow(clippy::literal_string_with_formatting_args)]
    // These are template placeholders, not format args
    Ok(DIRECTORY_TEMPLATE
        .replace("{path}", request_path)
        .replace("{parent_link}", &parent_link)
        .replace("{entries}", &items.join("\n        ")))
}

// ============================================================================
// Tests
// ============================================================================
