//! Per-request access log.
//!
//! Emits one `request completed` record per request through the sink:
//! method, path, remote address, user agent, request ID, status, body size
//! and duration.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, State},
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::http::request::request_id;
use crate::observability::metrics;
use crate::sink::{AsyncSink, Attr, Level, LogRecord};

/// Sink handle pre-decorated for the access log.
#[derive(Debug, Clone)]
pub struct AccessLog {
    sink: AsyncSink,
}

impl AccessLog {
    pub fn new(sink: &AsyncSink) -> Self {
        let sink = sink.with_attrs([Attr::new("component", "middleware/logger")]);
        sink.submit(
            LogRecord::new(Level::Info, "logger middleware enabled").with_target(module_path!()),
        );
        Self { sink }
    }

    pub fn sink(&self) -> &AsyncSink {
        &self.sink
    }
}

/// Middleware recording every request that passes through it.
pub async fn access_log(
    State(log): State<AccessLog>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let entry = log.sink.with_attrs([
        Attr::new("method", method.as_str()),
        Attr::new("path", request.uri().path()),
        Attr::new("remote_addr", remote_addr),
        Attr::new("user_agent", user_agent),
        Attr::new("request_id", request_id(&request).unwrap_or_default()),
    ]);

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status().as_u16();
    let bytes = response
        .body()
        .size_hint()
        .exact()
        .or_else(|| {
            response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(0);

    entry.submit(
        LogRecord::new(Level::Info, "request completed")
            .with_target(module_path!())
            .with_attr("status", status)
            .with_attr("bytes", bytes)
            .with_attr("duration", format!("{:?}", elapsed)),
    );
    metrics::record_request(&method, status, start);

    response
}
