//! HTTP surface of the stub: an axum router over a shared [`StubStore`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::store::{StubRejection, StubStore};
use crate::core::{
    ErrorBody, InvoiceSendRequest, InvoiceSendResponse, InvoiceStatusResponse, KsefError, Result,
    TokenRequest, TokenResponse,
};

/// Build the stub router over a shared store.
///
/// Exposed separately from [`StubServer`] so tests can drive it without a
/// socket (`tower::ServiceExt::oneshot`).
pub fn router(store: Arc<StubStore>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/v1/auth/token", post(issue_token))
        .route("/v1/invoices/send", post(receive_invoice))
        .route("/v1/invoices/{number}/status", get(invoice_status))
        .route("/v1/invoices/{number}/download", get(download_invoice))
        .with_state(store)
}

impl IntoResponse for StubRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn service_info() -> Json<serde_json::Value> {
    Json(json!({
        "name": "KSeF Stub Server",
        "endpoints": {
            "token": "POST /v1/auth/token",
            "send": "POST /v1/invoices/send",
            "status": "GET /v1/invoices/{number}/status",
            "download": "GET /v1/invoices/{number}/download?format=xml|pdf",
        },
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now() }))
}

async fn issue_token(
    State(store): State<Arc<StubStore>>,
    Json(request): Json<TokenRequest>,
) -> std::result::Result<Json<TokenResponse>, StubRejection> {
    let token = store.issue_token(&request.nip, &request.environment)?;
    Ok(Json(token))
}

async fn receive_invoice(
    State(store): State<Arc<StubStore>>,
    headers: HeaderMap,
    Json(request): Json<InvoiceSendRequest>,
) -> std::result::Result<Json<InvoiceSendResponse>, StubRejection> {
    let token = bearer(&headers)?;
    let ksef_number =
        store.receive_invoice(&token, &request.xml_content, request.filename.as_deref())?;
    Ok(Json(InvoiceSendResponse { ksef_number }))
}

async fn invoice_status(
    State(store): State<Arc<StubStore>>,
    Path(number): Path<String>,
    headers: HeaderMap,
) -> std::result::Result<Json<InvoiceStatusResponse>, StubRejection> {
    let token = bearer(&headers)?;
    let (status, timestamp) = store.invoice_status(&token, &number)?;
    Ok(Json(InvoiceStatusResponse {
        ksef_number: number,
        status: status.as_str().to_string(),
        timestamp,
    }))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    format: Option<String>,
}

async fn download_invoice(
    State(store): State<Arc<StubStore>>,
    Path(number): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> std::result::Result<Response, StubRejection> {
    let token = bearer(&headers)?;
    let format = query.format.as_deref().unwrap_or("xml");
    let (content_type, bytes) = store.download_invoice(&token, &number, format)?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

fn bearer(headers: &HeaderMap) -> std::result::Result<String, StubRejection> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| StubRejection::Unauthorized("missing bearer token".into()))
}

/// Running stub server bound to a local address.
///
/// Shuts down gracefully on [`StubServer::shutdown`]; dropping the handle
/// aborts the serve task.
pub struct StubServer {
    addr: SocketAddr,
    store: Arc<StubStore>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Start a server with a fresh store. Use port 0 for an ephemeral port.
    pub async fn start(addr: SocketAddr) -> Result<Self> {
        Self::start_with_store(addr, Arc::new(StubStore::new())).await
    }

    /// Start a server over an existing (possibly shared) store.
    pub async fn start_with_store(addr: SocketAddr, store: Arc<StubStore>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let app = router(store.clone());

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("stub server error: {err}");
            }
        });

        info!(%addr, "stub server listening");
        Ok(Self { addr, store, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    /// Bound address (resolves the actual port when started with port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL suitable for [`crate::core::KsefConfig::new`].
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The store behind the server, for inspection or reset.
    pub fn store(&self) -> Arc<StubStore> {
        self.store.clone()
    }

    /// Stop accepting connections and wait for the serve task to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(KsefError::Internal(format!("stub server panicked: {err}")));
                }
            }
        }

        Ok(())
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

/// Serve until the process is terminated. Used by the CLI `stub-server`
/// command.
pub async fn serve(addr: SocketAddr, store: Arc<StubStore>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "stub server listening");
    axum::serve(listener, router(store))
        .await
        .map_err(|e| KsefError::Internal(format!("stub server error: {e}")))
}
