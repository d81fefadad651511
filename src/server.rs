//! HTTP server for ann-serve
//!
//! Exposes the search pipeline over HTTP using axum.
//!
//! # Endpoints
//!
//! - `POST /search` - Nearest neighbors for a batch of query vectors
//!
//! # Concurrency Model
//!
//! Each request holds one permit of a fair `tokio::sync::Semaphore` while its
//! pipeline runs on the blocking pool, so at most `listener_threads` searches
//! execute at once and the rest wait in arrival order. The index behind
//! [`SearchService`] is immutable and read without locks.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::RequestError;
use crate::search::SearchService;

/// Shared application state
pub struct AppState {
    pub service: SearchService,
    workers: Semaphore,
}

impl AppState {
    pub fn new(service: SearchService, listener_threads: NonZeroUsize) -> Self {
        Self {
            service,
            workers: Semaphore::new(listener_threads.get()),
        }
    }

    /// Pipelines that could start right now without waiting
    pub fn idle_workers(&self) -> usize {
        self.workers.available_permits()
    }
}

/// POST /search - Query for nearest neighbors
async fn search(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match run_pipeline(&state, body).await {
        Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
        Err(err) => {
            tracing::warn!(stage = err.stage().as_str(), error = %err, "search request failed");
            err.into_response()
        }
    }
}

async fn run_pipeline(state: &AppState, body: Bytes) -> Result<Vec<u8>, RequestError> {
    let _permit = state
        .workers
        .acquire()
        .await
        .map_err(|_| RequestError::SearchEngine("worker pool is closed".into()))?;

    let service = state.service.clone();
    tokio::task::spawn_blocking(move || service.handle(&body))
        .await
        .map_err(|e| RequestError::SearchEngine(format!("search task aborted: {}", e)))?
}

/// One line per request, at debug level
async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let version = request.version();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".into());

    let response = next.run(request).await;

    tracing::debug!(
        "{} {} {:?} {} - from {}",
        method,
        path,
        version,
        response.status().as_u16(),
        remote
    );
    response
}

/// Create the axum router
pub fn create_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/search", post(search))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM
pub async fn serve(
    state: Arc<AppState>,
    listener: TcpListener,
    max_body_bytes: usize,
) -> std::io::Result<()> {
    let router = create_router(state, max_body_bytes);

    tracing::info!("Starting ann-serve on {}", listener.local_addr()?);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
