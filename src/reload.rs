//! Browser live reload over WebSocket.
//!
//! A small `tungstenite` endpoint next to the HTTP server. Served HTML pages
//! get [`client_script`] injected; after each rebuild [`ReloadServer::broadcast`]
//! tells every connected page to reload.

use crate::log;
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::{
    net::{IpAddr, SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
};
use tungstenite::{Message, WebSocket};

/// Message sent to clients when the site has been rebuilt.
pub const RELOAD_MESSAGE: &str = "reload";

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

#[derive(Clone)]
pub struct ReloadServer {
    clients: Clients,
    port: u16,
}

impl ReloadServer {
    /// Bind the WebSocket listener and start accepting clients.
    pub fn start(interface: IpAddr, base_port: u16, attempts: u16) -> Result<Self> {
        let listener = try_bind(interface, base_port, attempts)?;
        let addr = listener.local_addr()?;
        let clients: Clients = Arc::default();

        let accepted = Arc::clone(&clients);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                match tungstenite::accept(stream) {
                    Ok(socket) => accepted.lock().push(socket),
                    Err(err) => log!("reload"; "handshake failed: {err}"),
                }
            }
        });

        log!("reload"; "ws://{addr}");
        Ok(Self {
            clients,
            port: addr.port(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Tell every client to reload; disconnected clients are dropped.
    pub fn broadcast(&self) -> usize {
        let mut clients = self.clients.lock();
        clients.retain_mut(|socket| socket.send(Message::Text(RELOAD_MESSAGE.into())).is_ok());
        clients.len()
    }
}

fn try_bind(interface: IpAddr, base_port: u16, attempts: u16) -> Result<TcpListener> {
    let mut last_err = None;
    for offset in 0..attempts.max(1) {
        let addr = SocketAddr::new(interface, base_port.saturating_add(offset));
        match TcpListener::bind(addr) {
            Ok(listener) => return Ok(listener),
            Err(err) => last_err = Some(err),
        }
    }
    Err(anyhow!(
        "Failed to bind reload socket after {} attempts from port {}: {}",
        attempts.max(1),
        base_port,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Script that reconnects the page to the reload endpoint.
pub fn client_script(port: u16) -> String {
    format!(
        "<script>(() => {{\
const ws = new WebSocket(`ws://${{location.hostname}}:{port}`);\
ws.onmessage = (e) => {{ if (e.data === \"{RELOAD_MESSAGE}\") location.reload(); }};\
}})();</script>"
    )
}

/// Insert `script` before the last `</body>`, or append it.
pub fn inject_script(html: &str, script: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], script, &html[pos..]),
        None => format!("{html}{script}"),
    }
}
