//! Local HTTPS listener receiving the `form_post` redirect
//!
//! The identity provider delivers the ID token by making the browser POST an
//! `application/x-www-form-urlencoded` form to the redirect URI. This module
//! runs a short-lived TLS server on `localhost` that accepts exactly one such
//! POST and hands its outcome to the waiting caller through a single-use
//! oneshot slot.
//!
//! # Lifecycle
//!
//! ```text
//! CallbackListener::new  -> Idle
//! CallbackListener::start -> Listening   (ServerHandle returned)
//! first accepted POST     -> Delivered   (slot emptied)
//! ServerHandle::shutdown  -> Terminated  (server task joined)
//! ```
//!
//! # Responses
//!
//! | Request                              | Status | Delivers          |
//! |--------------------------------------|--------|-------------------|
//! | anything but `POST /{endpoint}`      | 404    | -                 |
//! | `POST` after a result was delivered  | 410    | -                 |
//! | bad or missing `Content-Length`      | 400    | -                 |
//! | form with `error`                    | 500    | `Error(params)`   |
//! | `state` mismatch (when verifying)    | 400    | -                 |
//! | form without `id_token`              | 400    | -                 |
//! | form with `id_token`                 | 200    | `Token(id_token)` |

use std::collections::BTreeMap;
use std::io::BufReader;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE,
};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use bytes::Bytes;
use rustls::ServerConfig;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{IdTokenError, Result};

/// Parsed form parameters: every key maps to its values in arrival order.
pub type FormParams = BTreeMap<String, Vec<String>>;

/// Outcome of the redirect, produced once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    /// The provider delivered an ID token.
    Token(String),
    /// The provider redirected back with an `error` parameter.
    Error(FormParams),
}

/// Observable lifecycle state of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Constructed, not yet accepting connections.
    Idle,
    /// Bound and serving; no result delivered yet.
    Listening,
    /// A result sits in (or was taken from) the rendezvous slot.
    Delivered,
    /// The server task has finished; no more connections are accepted.
    Terminated,
}

/// Settings of one callback listener.
#[derive(Debug, Clone)]
pub struct CallbackConfig {
    /// Socket address to bind; port `0` picks a free port.
    pub bind_addr: SocketAddr,

    /// Path segment of the redirect URI, without slashes.
    pub endpoint: String,

    /// PEM file holding the certificate chain and private key.
    pub pem_path: PathBuf,

    /// How long in-flight connections may run after shutdown is requested.
    pub shutdown_grace: Duration,

    /// When set, callbacks must echo this `state`.
    pub expected_state: Option<String>,
}

impl CallbackConfig {
    /// Derives listener settings from the application configuration.
    ///
    /// `state` is the value sent in the authorization request; it is only
    /// enforced when `verify_state` is enabled.
    ///
    /// Binds the IPv4 loopback address only. The redirect URI names
    /// `localhost`, which browsers resolve to loopback and retry over IPv4
    /// when `::1` refuses the connection.
    pub fn from_config(config: &Config, state: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, config.listener.port)),
            endpoint: config.endpoint_segment().to_string(),
            pem_path: config.listener.key_path.clone(),
            shutdown_grace: config.listener.poll_interval(),
            expected_state: config.verify_state.then(|| state.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Request handling
// ---------------------------------------------------------------------------

/// Shared state of the request handler.
struct CallbackState {
    endpoint_path: String,
    expected_state: Option<String>,
    slot: Mutex<Option<oneshot::Sender<CallbackResult>>>,
}

impl CallbackState {
    fn new(
        endpoint: &str,
        expected_state: Option<String>,
        sender: oneshot::Sender<CallbackResult>,
    ) -> Self {
        Self {
            endpoint_path: format!("/{}", endpoint.trim_matches('/')),
            expected_state,
            slot: Mutex::new(Some(sender)),
        }
    }

    fn is_delivered(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Puts `result` into the slot. Returns `false` if it was already used.
    fn deliver(&self, result: CallbackResult) -> bool {
        let sender = self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        match sender {
            Some(sender) => {
                if sender.send(result).is_err() {
                    tracing::warn!("Callback result produced after the caller stopped waiting");
                }
                true
            }
            None => false,
        }
    }
}

fn router(state: Arc<CallbackState>) -> Router {
    Router::new().fallback(handle_request).with_state(state)
}

async fn handle_request(
    State(state): State<Arc<CallbackState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    tracing::debug!("{} {}", method, uri);

    if method != Method::POST || uri.path() != state.endpoint_path {
        return bare_response(StatusCode::NOT_FOUND);
    }

    if state.is_delivered() {
        tracing::debug!("Ignoring callback received after a result was delivered");
        return bare_response(StatusCode::GONE);
    }

    let params = match read_form(&headers, &body) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!("Rejecting callback: {}", e);
            return json_error(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    if params.contains_key("error") {
        tracing::warn!(?params, "Identity provider returned an error");
        let body = match serde_json::to_string(&params) {
            Ok(body) => body,
            Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        };
        if !state.deliver(CallbackResult::Error(params)) {
            return bare_response(StatusCode::GONE);
        }
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
    }

    if let Some(expected) = &state.expected_state {
        let received = params.get("state").and_then(|v| v.first());
        if received != Some(expected) {
            tracing::warn!(?received, "Rejecting callback with mismatched state");
            return json_error(StatusCode::BAD_REQUEST, "state mismatch");
        }
    }

    let Some(id_token) = params.get("id_token").and_then(|v| v.first()).cloned() else {
        tracing::warn!("{}", IdTokenError::MissingToken);
        return json_error(StatusCode::BAD_REQUEST, "missing id_token");
    };

    if !state.deliver(CallbackResult::Token(id_token)) {
        return bare_response(StatusCode::GONE);
    }
    tracing::debug!("ID token received");
    (StatusCode::OK, Json("Success")).into_response()
}

/// Validates `Content-Length` against the body and decodes the form.
fn read_form(headers: &HeaderMap, body: &[u8]) -> Result<FormParams> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| IdTokenError::MalformedRequest("missing Content-Length".to_string()))?;
    let declared: usize = declared
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| {
            IdTokenError::MalformedRequest(format!("invalid Content-Length {declared:?}"))
        })?;
    if declared != body.len() {
        return Err(IdTokenError::MalformedRequest(format!(
            "Content-Length {declared} does not match body length {}",
            body.len()
        ))
        .into());
    }
    if std::str::from_utf8(body).is_err() {
        return Err(IdTokenError::MalformedRequest("body is not valid UTF-8".to_string()).into());
    }
    Ok(parse_form(body))
}

/// Decodes an `application/x-www-form-urlencoded` body.
///
/// Keys with blank values are skipped; repeated keys accumulate.
pub fn parse_form(body: &[u8]) -> FormParams {
    let mut params = FormParams::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        if value.is_empty() {
            continue;
        }
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}

/// Empty response used for 404 and 410.
fn bare_response(status: StatusCode) -> Response {
    (
        status,
        [
            (CONTENT_LENGTH, "0"),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (CONNECTION, "close"),
        ],
    )
        .into_response()
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

// ---------------------------------------------------------------------------
// TLS
// ---------------------------------------------------------------------------

/// Loads a combined certificate + private key PEM into a rustls server config.
///
/// ALPN only offers `http/1.1`; the `Connection` header sent on 404
/// responses is not allowed over HTTP/2.
///
/// # Errors
///
/// Returns [`IdTokenError::Tls`] if the file is unreadable or lacks a
/// certificate or private key.
pub fn load_tls_config(pem_path: &Path) -> Result<ServerConfig> {
    // Ensure a crypto provider is installed (ring via feature flag).
    let _ = rustls::crypto::ring::default_provider().install_default();

    let pem = std::fs::read(pem_path).map_err(|e| {
        IdTokenError::Tls(format!("failed to read {}: {e}", pem_path.display()))
    })?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(pem.as_slice()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| IdTokenError::Tls(format!("failed to parse certificates: {e}")))?;
    if certs.is_empty() {
        return Err(IdTokenError::Tls(format!(
            "no certificate found in {}",
            pem_path.display()
        ))
        .into());
    }

    let key = rustls_pemfile::private_key(&mut BufReader::new(pem.as_slice()))
        .map_err(|e| IdTokenError::Tls(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| {
            IdTokenError::Tls(format!("no private key found in {}", pem_path.display()))
        })?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| IdTokenError::Tls(format!("invalid certificate/key pair: {e}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

// ---------------------------------------------------------------------------
// Listener lifecycle
// ---------------------------------------------------------------------------

/// An idle callback listener.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use id_token_generator::oidc::callback::{CallbackConfig, CallbackListener, CallbackResult};
///
/// # async fn example() -> id_token_generator::error::Result<()> {
/// let config = CallbackConfig {
///     bind_addr: "127.0.0.1:4553".parse()?,
///     endpoint: "callback".to_string(),
///     pem_path: "cert/server.pem".into(),
///     shutdown_grace: Duration::from_secs(1),
///     expected_state: None,
/// };
///
/// let mut server = CallbackListener::new(config).start().await?;
/// let result = server.wait_for_result(Some(Duration::from_secs(300))).await;
/// server.shutdown().await?;
///
/// if let CallbackResult::Token(token) = result? {
///     println!("{token}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CallbackListener {
    config: CallbackConfig,
}

impl CallbackListener {
    /// Creates a listener without binding anything.
    pub fn new(config: CallbackConfig) -> Self {
        Self { config }
    }

    /// Always [`ListenerState::Idle`]; see [`ServerHandle::state`] once started.
    pub fn state(&self) -> ListenerState {
        ListenerState::Idle
    }

    /// Loads TLS material, binds the socket and starts serving on a
    /// background task.
    ///
    /// Returns once the socket is bound, so the redirect URI can be built
    /// from [`ServerHandle::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::Tls`] for unusable key material and
    /// [`IdTokenError::Listener`] if the address cannot be bound.
    pub async fn start(self) -> Result<ServerHandle> {
        let tls = load_tls_config(&self.config.pem_path)?;

        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(CallbackState::new(
            &self.config.endpoint,
            self.config.expected_state.clone(),
            sender,
        ));
        let app = router(Arc::clone(&state));

        let handle = axum_server::Handle::new();
        let server = axum_server::bind_rustls(
            self.config.bind_addr,
            RustlsConfig::from_config(Arc::new(tls)),
        )
        .handle(handle.clone());

        tracing::debug!("Starting callback listener on {}", self.config.bind_addr);
        let task = tokio::spawn(async move { server.serve(app.into_make_service()).await });

        let Some(local_addr) = handle.listening().await else {
            let reason = match task.await {
                Ok(Err(e)) => e.to_string(),
                Ok(Ok(())) => "server exited before listening".to_string(),
                Err(e) => e.to_string(),
            };
            return Err(IdTokenError::Listener(format!(
                "failed to bind {}: {reason}",
                self.config.bind_addr
            ))
            .into());
        };

        tracing::info!(
            "Listening for the redirect on https://localhost:{}{}",
            local_addr.port(),
            state.endpoint_path
        );

        Ok(ServerHandle {
            handle,
            task: Some(task),
            local_addr,
            state,
            receiver: Some(receiver),
            shutdown_grace: self.config.shutdown_grace,
        })
    }
}

/// A running callback listener.
///
/// Owns the server task; the caller only waits for the result and stops it.
pub struct ServerHandle {
    handle: axum_server::Handle,
    task: Option<JoinHandle<std::io::Result<()>>>,
    local_addr: SocketAddr,
    state: Arc<CallbackState>,
    receiver: Option<oneshot::Receiver<CallbackResult>>,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        let stopped = self.task.as_ref().map_or(true, |task| task.is_finished());
        if stopped {
            ListenerState::Terminated
        } else if self.state.is_delivered() {
            ListenerState::Delivered
        } else {
            ListenerState::Listening
        }
    }

    /// Blocks until the redirect delivers a result.
    ///
    /// Can be called once; the slot is never reused.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::Timeout`] when `timeout` elapses first and
    /// [`IdTokenError::Listener`] if the server stopped without a result or
    /// the result was already consumed.
    pub async fn wait_for_result(&mut self, timeout: Option<Duration>) -> Result<CallbackResult> {
        let receiver = self.receiver.take().ok_or_else(|| {
            IdTokenError::Listener("callback result was already consumed".to_string())
        })?;

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, receiver)
                .await
                .map_err(|_| IdTokenError::Timeout {
                    seconds: limit.as_secs(),
                })?,
            None => receiver.await,
        };

        received.map_err(|_| {
            IdTokenError::Listener(
                "callback listener stopped before a result was delivered".to_string(),
            )
            .into()
        })
    }

    /// Stops accepting connections and waits for the server task to finish.
    ///
    /// In-flight responses get up to the configured grace period. Afterwards
    /// [`ServerHandle::state`] reports [`ListenerState::Terminated`]; calling
    /// this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::Listener`] if the server task failed.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        tracing::debug!("Shutting down callback listener");
        self.handle.graceful_shutdown(Some(self.shutdown_grace));

        tracing::debug!("Joining callback listener task");
        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(IdTokenError::Listener(format!("server error: {e}")).into()),
            Err(e) => {
                Err(IdTokenError::Listener(format!("server task failed: {e}")).into())
            }
        }
    }
}
