//! # Collector Server
//!
//! An `axum` server with two routes:
//!
//! - `POST /collect` runs one collection against the database named in the
//!   body and stores the results in the registry's gauges.
//! - `GET /metrics` renders the registry in the Prometheus text format.
//!
//! The server stops when the shutdown channel fires.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace, warn};

use crate::collector::{CollectRequest, Collector};

pub struct CollectorServer {
    listener: TcpListener,
    collector: Arc<Collector>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Builds the router; exposed for tests that drive it without a socket.
pub fn router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/collect", post(collect_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(collector)
}

async fn collect_handler(
    State(collector): State<Arc<Collector>>,
    payload: Result<Json<CollectRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed collect request");
            return (StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match collector
        .collect(
            &request.secret_path,
            &request.db_name,
            &request.host,
            &request.metric_names,
        )
        .await
    {
        Ok(()) => (StatusCode::OK, "metrics collected".to_string()),
        Err(e) => {
            error!(error = %e, secret_path = %request.secret_path, "Collect request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("collect failed: {}", e),
            )
        }
    }
}

async fn metrics_handler(State(collector): State<Arc<Collector>>) -> impl IntoResponse {
    match collector.registry().render() {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

impl CollectorServer {
    /// Creates a server on an already bound listener without spawning it.
    pub fn new(
        listener: TcpListener,
        collector: Arc<Collector>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            collector,
            shutdown_rx,
        }
    }

    /// Returns a future that serves until a shutdown signal is received.
    pub fn run(mut self) -> impl Future<Output = ()> {
        let app = router(self.collector.clone());

        async move {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    trace!("Collector server received shutdown signal via select.");
                }
                result = axum::serve(self.listener, app.into_make_service()) => {
                    if let Err(e) = result {
                        error!("Collector server error: {}", e);
                    }
                }
            }
            trace!("Collector server task finished.");
        }
    }
}
