//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, access log, timeout)
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::access_log::{access_log, AccessLog};
use crate::http::request::{UuidRequestId, X_REQUEST_ID};
use crate::sink::{AsyncSink, Level, LogRecord};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub sink: AsyncSink,
}

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server logging through `sink`.
    pub fn new(config: ServiceConfig, sink: AsyncSink) -> Self {
        let router = Self::build_router(&config, sink);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, sink: AsyncSink) -> Router {
        let access = AccessLog::new(&sink);
        let state = AppState { sink };

        let mut router = Router::new()
            .route("/health", get(health))
            .route("/api/v1/echo", post(echo))
            .with_state(state.clone());

        if config.admin.enabled {
            router = router.merge(setup_admin_router(state, config.admin.api_key.clone()));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(middleware::from_fn_with_state(access, access_log))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Echo the request body back; logs its size through the explicit sink handle.
async fn echo(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    state.sink.submit(
        LogRecord::new(Level::Debug, "echo")
            .with_target(module_path!())
            .with_attr("size", body.len()),
    );
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{RecordWriter, Scope, WriteError};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Clone, Default)]
    struct Messages(Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>);

    impl RecordWriter for Messages {
        fn write(&mut self, record: &LogRecord, scope: &Scope) -> Result<(), WriteError> {
            let attrs = scope
                .flatten(record)
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect();
            self.0
                .lock()
                .unwrap()
                .push((record.message().to_string(), attrs));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_access_log_records_request() {
        let out = Messages::default();
        let sink = AsyncSink::spawn(out.clone()).unwrap();
        let server = HttpServer::new(ServiceConfig::default(), sink.clone());

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("user-agent", "test-agent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let echoed_id = response.headers().get("x-request-id").cloned().unwrap();

        sink.close();
        let lines = out.0.lock().unwrap().clone();
        assert_eq!(lines[0].0, "logger middleware enabled");

        let (msg, attrs) = &lines[1];
        assert_eq!(msg, "request completed");
        let get = |key: &str| {
            attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("component"), "middleware/logger");
        assert_eq!(get("method"), "GET");
        assert_eq!(get("path"), "/health");
        assert_eq!(get("user_agent"), "test-agent");
        assert_eq!(get("status"), "200");
        assert_eq!(get("bytes"), "2");
        assert_eq!(get("request_id"), echoed_id.to_str().unwrap());
    }

    #[tokio::test]
    async fn test_admin_routes_absent_by_default() {
        let sink = AsyncSink::spawn(Messages::default()).unwrap();
        let server = HttpServer::new(ServiceConfig::default(), sink.clone());

        let response = server
            .router()
            .oneshot(Request::builder().uri("/admin/sink").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        sink.close();
    }
}
