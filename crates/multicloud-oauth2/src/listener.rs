//! Local redirect listener
//!
//! Receives the authorization server's redirect on a loopback port and hands
//! the query parameters to whichever grant is currently waiting for them.
//!
//! ## Components
//!
//! - [`RedirectListener`] - Binds once and is shared by every grant of the process
//! - [`RedirectHandler`] - Implemented by redirect-based grants
//! - [`WebPage`] - The status page rendered back to the browser
//!
//! ## Design Notes
//!
//! - Starting a running listener is a no-op that returns the bound address.
//! - Binding to port 0 picks an ephemeral port; [`RedirectListener::bound_uri`]
//!   reports the actual one so it can serve as redirect URI.
//! - The accept loop stops through a `CancellationToken`, like every other
//!   background server in this workspace.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use multicloud_core::config::OAuthConfig;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// WebPage
// ============================================================================

/// A page returned to the browser after a redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebPage {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl WebPage {
    /// Creates an HTML page with the given status and raw body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![(
                CONTENT_TYPE.as_str().to_string(),
                "text/html; charset=utf-8".to_string(),
            )],
            body: body.into(),
        }
    }

    /// Creates a simple page with a heading and one paragraph
    pub fn message(status: u16, title: &str, message: &str) -> Self {
        Self::new(
            status,
            format!(
                r#"<!DOCTYPE html>
<html>
<head><title>MultiCloud - {title}</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>{title}</h1>
    <p>{message}</p>
    <p>You can close this window.</p>
</body>
</html>"#
            ),
        )
    }

    /// Page confirming the redirect was accepted
    pub fn success(message: &str) -> Self {
        Self::message(200, "Authorization", message)
    }

    /// Page reporting a rejected redirect
    pub fn failure(message: &str) -> Self {
        Self::message(400, "Authorization Error", message)
    }

    /// Adds or replaces a response header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid response header"),
            }
        }
        response
    }
}

// ============================================================================
// RedirectHandler
// ============================================================================

/// Consumes the query parameters of a redirect
pub trait RedirectHandler: Send + Sync {
    /// Called once per incoming request; the returned page is sent back
    fn on_redirect(&self, params: &HashMap<String, String>) -> WebPage;
}

type SharedHandler = Arc<RwLock<Option<Arc<dyn RedirectHandler>>>>;

// ============================================================================
// RedirectListener
// ============================================================================

struct Running {
    address: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Loopback HTTP endpoint for OAuth2 redirects
pub struct RedirectListener {
    address: String,
    port: u16,
    running: Mutex<Option<Running>>,
    handler: SharedHandler,
}

impl RedirectListener {
    /// Creates a stopped listener for `address:port`; port 0 is ephemeral
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            running: Mutex::new(None),
            handler: Arc::new(RwLock::new(None)),
        }
    }

    pub fn from_config(config: &OAuthConfig) -> Self {
        Self::new(config.listener_address.clone(), config.listener_port)
    }

    /// Binds and starts serving; returns the bound address
    ///
    /// # Errors
    ///
    /// Returns the bind error when the address is unavailable. A listener
    /// that is already running is left as is.
    pub async fn start(&self) -> std::io::Result<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            debug!(address = %current.address, "Redirect listener already running");
            return Ok(current.address);
        }

        let listener = TcpListener::bind((self.address.as_str(), self.port)).await?;
        let address = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.handler),
            shutdown.clone(),
        ));
        info!(%address, "Redirect listener started");

        *running = Some(Running {
            address,
            shutdown,
            task,
        });
        Ok(address)
    }

    /// Stops serving and releases the port; stopping twice is harmless
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.shutdown.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "Redirect listener task ended abnormally");
        }
        info!(address = %running.address, "Redirect listener stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Address the listener is bound to, while running
    pub async fn bound_address(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.address)
    }

    /// `http://host:port/` of the running listener
    pub async fn bound_uri(&self) -> Option<String> {
        self.bound_address()
            .await
            .map(|address| format!("http://{}/", address))
    }

    /// Routes subsequent redirects to `handler`, replacing the previous one
    pub async fn set_handler(&self, handler: Arc<dyn RedirectHandler>) {
        *self.handler.write().await = Some(handler);
    }

    pub async fn clear_handler(&self) {
        *self.handler.write().await = None;
    }
}

impl std::fmt::Debug for RedirectListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectListener")
            .field("address", &self.address)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

async fn accept_loop(listener: TcpListener, handler: SharedHandler, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                let stream = match result {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!(error = %e, "Redirect listener failed to accept");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let handler = Arc::clone(&handler);

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let handler = Arc::clone(&handler);
                        async move { Ok::<_, Infallible>(handle_request(req, &handler).await) }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(error = %e, "Redirect connection error");
                    }
                });
            }
            _ = shutdown.cancelled() => {
                debug!("Redirect listener shutting down");
                break;
            }
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    handler: &SharedHandler,
) -> Response<Full<Bytes>> {
    if req.uri().path() == "/favicon.ico" {
        return WebPage::new(404, "").into_response();
    }

    let params = parse_query(&req.uri().to_string());
    debug!(path = %req.uri().path(), params = params.len(), "Redirect received");

    let current = handler.read().await.clone();
    let page = match current {
        Some(handler) => handler.on_redirect(&params),
        None => WebPage::message(404, "Not Found", "No authorization is in progress."),
    };
    page.into_response()
}

/// Extracts query parameters from a request target
fn parse_query(uri: &str) -> HashMap<String, String> {
    url::Url::parse(&format!("http://localhost{}", uri))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default()
}
