use super::*;
use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::InstanceState;
use tokio::{net::TcpListener, sync::Mutex};

use crate::ControlPlane;

#[derive(Clone)]
struct BackendState {
    command_hits: Arc<Mutex<u32>>,
    command_body: Value,
}

async fn handle_command(State(state): State<BackendState>) -> Json<Value> {
    *state.command_hits.lock().await += 1;
    Json(state.command_body.clone())
}

async fn spawn_backend(status_body: Value, command_body: Value) -> (String, Arc<Mutex<u32>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let command_hits = Arc::new(Mutex::new(0));
    let state = BackendState {
        command_hits: Arc::clone(&command_hits),
        command_body,
    };
    let app = Router::new()
        .route(
            "/instance/status",
            get(move || async move { Json(status_body.clone()) }),
        )
        .route("/instance/start", post(handle_command))
        .route("/instance/stop", post(handle_command))
        .route("/service/start", post(handle_command))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), command_hits)
}

#[tokio::test]
async fn instance_status_decodes_success_envelope() {
    let (url, _) = spawn_backend(
        json!({"success": true, "data": {"ipAddress": "203.0.113.7", "state": "running"}}),
        json!({"success": true}),
    )
    .await;
    let plane = HttpControlPlane::new(&url).expect("client");

    let status = plane.instance_status().await.expect("status");
    assert_eq!(status.state, InstanceState::Running);
    assert_eq!(status.ip_address.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn unrecognized_lifecycle_state_decodes_as_unknown() {
    let (url, _) = spawn_backend(
        json!({"success": true, "data": {"ipAddress": null, "state": "migrating"}}),
        json!({"success": true}),
    )
    .await;
    let plane = HttpControlPlane::new(&url).expect("client");

    let status = plane.instance_status().await.expect("status");
    assert_eq!(status.state, InstanceState::Unknown);
}

#[tokio::test]
async fn backend_error_envelope_surfaces_its_message() {
    let (url, _) = spawn_backend(
        json!({"success": false, "error": "instance not found"}),
        json!({"success": true}),
    )
    .await;
    let plane = HttpControlPlane::new(&url).expect("client");

    let err = plane.instance_status().await.expect_err("failure");
    assert!(err.to_string().contains("instance not found"));
}

#[tokio::test]
async fn commands_post_to_their_endpoints() {
    let (url, command_hits) = spawn_backend(
        json!({"success": true, "data": {"ipAddress": null, "state": "stopped"}}),
        json!({"success": true}),
    )
    .await;
    let plane = HttpControlPlane::new(&url).expect("client");

    plane.start_instance().await.expect("start instance");
    plane.stop_instance().await.expect("stop instance");
    plane.start_service().await.expect("start service");
    assert_eq!(*command_hits.lock().await, 3);
}

#[tokio::test]
async fn failed_command_envelope_is_an_error() {
    let (url, _) = spawn_backend(
        json!({"success": true, "data": {"ipAddress": null, "state": "stopped"}}),
        json!({"success": false, "error": "api throttled"}),
    )
    .await;
    let plane = HttpControlPlane::new(&url).expect("client");

    let err = plane.start_instance().await.expect_err("failure");
    assert!(err.to_string().contains("api throttled"));
}

#[test]
fn base_url_must_be_absolute() {
    assert!(HttpControlPlane::new("not a url").is_err());
}
