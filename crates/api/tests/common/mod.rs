#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use fleetwatch_api::config::ServerConfig;
use fleetwatch_api::router::build_app_router;
use fleetwatch_api::state::AppState;
use fleetwatch_core::memory::InMemoryStore;

pub const TEST_SECRET: &str = "test-secret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        api_secret: TEST_SECRET.to_string(),
        db_max_connections: 1,
    }
}

/// Build the full application router over a fresh in-memory store.
pub fn build_test_app() -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let app = build_app_router(AppState::new(store.clone(), test_config()));
    (app, store)
}

/// Send a request and decode the JSON response body (`Null` when empty).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn post_json(uri: &str, key: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// POST an arbitrary body, e.g. one that is not valid JSON.
pub fn post_raw(uri: &str, key: Option<&str>, content_type: &str, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn register_body(system_name: &str, location: &str) -> Value {
    json!({
        "system_name": system_name,
        "location": location,
        "os_type": "Linux",
        "hostname": format!("{system_name}-host"),
        "public_ip": "198.51.100.4",
    })
}

pub fn metrics_body(system_name: &str, location: &str, cpu: f64, ts: DateTime<Utc>) -> Value {
    json!({
        "system_name": system_name,
        "location": location,
        "timestamp": ts.to_rfc3339(),
        "cpu_percent": cpu,
        "cpu_per_core": [cpu, cpu],
        "cpu_freq_mhz": 3200.0,
        "cpu_temp": null,
        "ram_total_gb": 16.0,
        "ram_used_gb": 8.0,
        "ram_percent": 50.0,
        "swap_total_gb": 2.0,
        "swap_used_gb": 0.0,
        "swap_percent": 0.0,
        "gpu_info": null,
        "disk_partitions": [
            {"mountpoint": "/", "device": "/dev/sda1", "fstype": "ext4", "percent": 40.0}
        ],
        "disk_io": {"read_mb": 10.0, "write_mb": 5.0},
        "net_bytes_sent": 1024.0,
        "net_bytes_recv": 2048.0,
        "net_packets_sent": 10.0,
        "net_packets_recv": 20.0,
        "public_ip": "203.0.113.7",
        "top_processes": [{"pid": 1, "name": "init", "cpu_percent": 0.1}],
        "uptime_seconds": 3600.0,
        "boot_time": "2024-05-01T00:00:00",
        "os_version": "Ubuntu 22.04",
        "hostname": format!("{system_name}-host"),
    })
}
