use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::sink::SinkStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let status = if state.sink.is_closed() {
        "draining"
    } else {
        "operational"
    };
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
    })
}

pub async fn get_sink_stats(State(state): State<AppState>) -> Json<SinkStats> {
    Json(state.sink.stats())
}
