use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::config::ApiConfig;
use crate::flow::LearningTable;
use crate::stats::{ControllerStats, FlowStatsCollector, TrafficLog};

#[derive(Clone)]
pub struct ApiState {
    pub learning: Arc<LearningTable>,
    pub traffic: Arc<TrafficLog>,
    pub collector: Arc<FlowStatsCollector>,
    pub stats: Arc<ControllerStats>,
}

pub async fn run_api(config: ApiConfig, state: ApiState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/stats", get(get_stats))
        .route("/stats/traffic", get(get_traffic))
        .route("/stats/flows", get(get_flow_stats))
        .route("/switches", get(get_switches))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!("REST API listening on {}", config.listen);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "videoflowd"
    }))
}

#[derive(Serialize)]
struct StatsResponse {
    controller: crate::stats::ControllerStatsSnapshot,
    traffic_flows: usize,
    reported_flows: usize,
}

async fn get_stats(State(state): State<ApiState>) -> impl IntoResponse {
    let response = StatsResponse {
        controller: state.stats.snapshot(),
        traffic_flows: state.traffic.flow_count(),
        reported_flows: state.collector.total_flow_count(),
    };
    Json(response)
}

async fn get_traffic(State(state): State<ApiState>) -> impl IntoResponse {
    let flows = state.traffic.snapshot();
    Json(serde_json::json!({
        "count": flows.len(),
        "flows": flows
    }))
}

async fn get_flow_stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.collector.snapshot())
}

#[derive(Serialize)]
struct LearnedHost {
    mac: String,
    port: u32,
}

async fn get_switches(State(state): State<ApiState>) -> impl IntoResponse {
    let switches: HashMap<String, Vec<LearnedHost>> = state
        .learning
        .snapshot()
        .into_iter()
        .map(|(switch, hosts)| {
            let hosts = hosts
                .into_iter()
                .map(|(mac, port)| LearnedHost {
                    mac: mac.to_string(),
                    port,
                })
                .collect();
            (switch.to_string(), hosts)
        })
        .collect();
    Json(switches)
}
