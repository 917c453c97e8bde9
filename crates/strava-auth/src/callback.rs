//! Loopback listener for the local-callback login flow
//!
//! The listener runs an axum router on a spawned task. The route handler and
//! the server task are the two producers; the login flow is the single
//! consumer. A oneshot sender sits in a shared slot so only the first
//! producer delivers, and the server is told to shut down as soon as the
//! consumer has its answer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{CALLBACK_HOST, CALLBACK_PATH, CALLBACK_PORT};
use crate::error::{Error, Result};

/// How long in-flight browser connections may take to finish after the code
/// has been received.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type Outcome = Result<String>;

/// Single-slot rendezvous shared by the producers.
#[derive(Clone)]
struct CallbackSlot(Arc<Mutex<Option<oneshot::Sender<Outcome>>>>);

impl CallbackSlot {
    fn new(tx: oneshot::Sender<Outcome>) -> Self {
        Self(Arc::new(Mutex::new(Some(tx))))
    }

    /// Deliver an outcome. Later deliveries are dropped.
    fn deliver(&self, outcome: Outcome) {
        let sender = self.0.lock().ok().and_then(|mut slot| slot.take());
        match sender {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => debug!("callback outcome already delivered, ignoring"),
        }
    }
}

/// A bound, not yet serving, callback listener.
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind to the host and port of `redirect_uri`.
    ///
    /// Missing port falls back to 8089 and an empty path to `/callback`.
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| Error::InvalidInput(format!("redirect URI {redirect_uri:?}: {e}")))?;
        let host = url.host_str().unwrap_or(CALLBACK_HOST).to_string();
        let port = redirect_port(redirect_uri, &url);
        let path = match url.path() {
            "" | "/" => CALLBACK_PATH.to_string(),
            p => p.to_string(),
        };

        let listener = TcpListener::bind((host.trim_matches(['[', ']']), port))
            .await
            .map_err(|e| Error::CallbackBind {
                port,
                reason: e.to_string(),
            })?;
        debug!(%host, port, %path, "callback listener bound");
        Ok(Self { listener, path })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until one outcome arrives or `timeout` elapses, then shut down.
    ///
    /// Returns the authorization code on success.
    pub async fn wait(self, timeout: Duration) -> Result<String> {
        let (tx, rx) = oneshot::channel::<Outcome>();
        let slot = CallbackSlot::new(tx);
        let app = router(&self.path, slot.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_slot = slot.clone();
        let mut server = tokio::spawn(async move {
            let served = axum::serve(self.listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                server_slot.deliver(Err(Error::Callback(e.to_string())));
            }
        });

        let outcome = tokio::select! {
            received = rx => received
                .unwrap_or_else(|_| Err(Error::Callback("listener stopped before a callback arrived".into()))),
            _ = tokio::time::sleep(timeout) => Err(Error::CallbackTimeout(timeout.as_secs())),
        };

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut server).await.is_err() {
            warn!("callback listener did not drain in time, aborting");
            server.abort();
        }

        if outcome.is_ok() {
            info!("authorization code received on callback");
        }
        outcome
    }
}

/// Port named in the redirect's authority, or 8089 when it names none.
///
/// `Url::port` drops a port equal to the scheme default, so the raw
/// authority decides whether one was written.
fn redirect_port(raw: &str, url: &Url) -> u16 {
    let authority = raw
        .split_once("://")
        .map_or(raw, |(_, rest)| rest)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let after_host = match host_port.rfind(']') {
        Some(end) => &host_port[end + 1..],
        None => host_port,
    };
    if after_host.contains(':') {
        url.port_or_known_default().unwrap_or(CALLBACK_PORT)
    } else {
        CALLBACK_PORT
    }
}

fn router(path: &str, slot: CallbackSlot) -> Router {
    Router::new()
        .route(path, get(handle_callback))
        .with_state(slot)
}

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<String> {
    if let Some(error) = params.get("error").filter(|e| !e.is_empty()) {
        slot.deliver(Err(Error::AuthorizationDenied(error.clone())));
        return Html(page(&format!("Authorization failed: {}", escape_html(error))));
    }
    match params.get("code").filter(|c| !c.is_empty()) {
        Some(code) => {
            slot.deliver(Ok(code.clone()));
            Html(page("Authorization successful!"))
        }
        None => {
            slot.deliver(Err(Error::InvalidInput(
                "callback did not include an authorization code".into(),
            )));
            Html(page("Authorization failed: no code received"))
        }
    }
}

fn page(heading: &str) -> String {
    format!("<html><body><h2>{heading}</h2><p>You may close this tab.</p></body></html>")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
