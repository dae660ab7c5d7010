//! Test utilities for ota-client
//!
//! Provides an in-process distribution server so cache, merge, and error
//! behavior can be asserted against real HTTP round trips, with request
//! counters per endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;

use crate::{ClientOptions, Manifest, OtaClient, Result};

/// Content registered for one (language, file) pair
#[derive(Clone)]
enum Content {
    Json(serde_json::Value),
    Text(String),
    Status(u16),
}

/// An in-memory distribution, built up file by file and then served over
/// HTTP on an ephemeral port.
pub struct MockDistribution {
    manifest: Manifest,
    content: HashMap<String, Content>,
}

impl MockDistribution {
    pub fn new(timestamp: i64) -> Self {
        Self {
            manifest: Manifest {
                timestamp,
                files: Vec::new(),
                languages: Vec::new(),
                language_mapping: HashMap::new(),
                custom_languages: HashMap::new(),
            },
            content: HashMap::new(),
        }
    }

    /// List a file in the manifest without registering any content for it
    pub fn file(mut self, path: &str) -> Self {
        if !self.manifest.files.iter().any(|f| f == path) {
            self.manifest.files.push(path.to_string());
        }
        self
    }

    /// List a language in the manifest without registering any content
    pub fn language(mut self, code: &str) -> Self {
        if !self.manifest.languages.iter().any(|l| l == code) {
            self.manifest.languages.push(code.to_string());
        }
        self
    }

    /// Register JSON content for a (language, file) pair.
    ///
    /// The file and language are added to the manifest as well.
    pub fn json(self, lang: &str, file: &str, value: serde_json::Value) -> Self {
        self.register(lang, file, Content::Json(value))
    }

    /// Register raw text content for a (language, file) pair
    pub fn text(self, lang: &str, file: &str, body: &str) -> Self {
        self.register(lang, file, Content::Text(body.to_string()))
    }

    /// Make the content endpoint for a (language, file) pair answer with
    /// the given status code
    pub fn failing(self, lang: &str, file: &str, status: u16) -> Self {
        self.register(lang, file, Content::Status(status))
    }

    fn register(mut self, lang: &str, file: &str, content: Content) -> Self {
        self.content
            .insert(format!("{}{}", lang, file), content);
        self.file(file).language(lang)
    }

    /// Bind the distribution to an ephemeral port and return a server with
    /// a client pointed at it.
    pub async fn serve(self, hash: &str, options: ClientOptions) -> Result<DistributionServer> {
        let state = ServerState {
            hash: hash.to_string(),
            manifest: Arc::new(self.manifest),
            content: Arc::new(self.content),
            manifest_hits: Arc::new(AtomicUsize::new(0)),
            content_hits: Arc::new(Mutex::new(HashMap::new())),
            last_timestamp: Arc::new(Mutex::new(None)),
        };

        let router = Router::new()
            .route("/{hash}/manifest.json", get(manifest_handler))
            .route("/{hash}/content/{*rest}", get(content_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // The listener is bound before the accept task starts, so incoming
        // connections queue and no startup wait is needed.
        let client = OtaClient::with_base_url(hash, &format!("http://{}", addr), options)?;

        Ok(DistributionServer {
            addr,
            client,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

#[derive(Clone)]
struct ServerState {
    hash: String,
    manifest: Arc<Manifest>,
    content: Arc<HashMap<String, Content>>,
    manifest_hits: Arc<AtomicUsize>,
    content_hits: Arc<Mutex<HashMap<String, usize>>>,
    last_timestamp: Arc<Mutex<Option<String>>>,
}

async fn manifest_handler(
    State(state): State<ServerState>,
    Path(hash): Path<String>,
) -> Response {
    if hash != state.hash {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.manifest_hits.fetch_add(1, Ordering::SeqCst);
    Json((*state.manifest).clone()).into_response()
}

async fn content_handler(
    State(state): State<ServerState>,
    Path((hash, rest)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if hash != state.hash {
        return StatusCode::NOT_FOUND.into_response();
    }

    *state.content_hits.lock().entry(rest.clone()).or_insert(0) += 1;
    *state.last_timestamp.lock() = params.get("timestamp").cloned();

    match state.content.get(&rest) {
        Some(Content::Json(value)) => Json(value.clone()).into_response(),
        Some(Content::Text(body)) => body.clone().into_response(),
        Some(Content::Status(code)) => StatusCode::from_u16(*code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// A distribution server bound to an ephemeral port, with a client pointed
/// at it. Shuts down when dropped.
pub struct DistributionServer {
    pub addr: SocketAddr,
    pub client: OtaClient,
    state: ServerState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl DistributionServer {
    /// Get the base URL of the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &OtaClient {
        &self.client
    }

    /// Number of requests the manifest endpoint has answered
    pub fn manifest_requests(&self) -> usize {
        self.state.manifest_hits.load(Ordering::SeqCst)
    }

    /// Number of content requests answered for one (language, file) pair
    pub fn content_requests(&self, lang: &str, file: &str) -> usize {
        self.state
            .content_hits
            .lock()
            .get(&format!("{}{}", lang, file))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of content requests answered
    pub fn total_content_requests(&self) -> usize {
        self.state.content_hits.lock().values().sum()
    }

    /// The `timestamp` query parameter of the most recent content request
    pub fn last_timestamp(&self) -> Option<String> {
        self.state.last_timestamp.lock().clone()
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for DistributionServer {
    fn drop(&mut self) {
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_keys_join_language_and_path() {
        let dist = MockDistribution::new(1).json("en", "/main.json", serde_json::json!({}));
        assert!(dist.content.contains_key("en/main.json"));
        assert_eq!(dist.manifest.files, vec!["/main.json"]);
        assert_eq!(dist.manifest.languages, vec!["en"]);
    }
}
