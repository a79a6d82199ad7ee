use std::sync::atomic::Ordering;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use dynamo_core::Error;
use dynamo_membership::MembershipTable;
use tower_http::trace::TraceLayer;

use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        node: state.node_id.clone(),
    })
}

async fn put_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>, AppError> {
    state.maybe_delay().await;
    let value = req
        .value
        .ok_or_else(|| AppError(Error::BadRequest("value required".into())))?;

    let outcome = state
        .coordinator
        .client_put(&key, &value, state.read_quorum_r, state.write_quorum_w)
        .await;

    Ok(Json(PutResponse {
        success: outcome.success,
        requested_replicas: outcome.requested_replicas,
        responded_to_parent_read: outcome.responded_to_parent_read,
        succeeded: outcome.succeeded,
        failed: outcome.failed,
        used_vc: outcome.stored_version.vc.clone(),
        stored_version: outcome.stored_version,
    }))
}

async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>, AppError> {
    state.maybe_delay().await;
    let outcome = state.coordinator.client_get(&key, state.read_quorum_r).await?;
    Ok(Json(GetResponse {
        resolved_versions: outcome.resolved_versions,
        responded_nodes: outcome.responded_nodes,
    }))
}

async fn replicate_handler(
    State(state): State<AppState>,
    Json(req): Json<ReplicateRequest>,
) -> Result<Json<ReplicateResponse>, AppError> {
    state.maybe_delay().await;
    let key = req
        .key
        .ok_or_else(|| AppError(Error::BadRequest("key & value required".into())))?;
    let value = req
        .value
        .ok_or_else(|| AppError(Error::BadRequest("key & value required".into())))?;

    state.store.put_local(&key, value, req.vc);

    Ok(Json(ReplicateResponse {
        status: "ok",
        node: state.node_id.clone(),
    }))
}

async fn get_local_handler(State(state): State<AppState>, Path(key): Path<String>) -> Json<GetLocalResponse> {
    Json(GetLocalResponse {
        versions: state.store.get_local_versions(&key),
    })
}

async fn gossip_handler(
    State(state): State<AppState>,
    Json(table): Json<MembershipTable>,
) -> Json<MembershipTable> {
    state.membership.merge(table);
    Json(state.membership.get_membership())
}

async fn replicas_for_key_handler(State(state): State<AppState>, Path(key): Path<String>) -> Json<ReplicasResponse> {
    let replicas = state.ring.get_replicas(&key, state.replication_factor, None);
    Json(ReplicasResponse { replicas })
}

async fn repair_once_handler(State(state): State<AppState>, Path(key): Path<String>) -> Json<RepairResponse> {
    match state.coordinator.repair_once(&key).await {
        Some(outcome) => Json(RepairResponse {
            ok: true,
            reason: None,
            local_before: outcome.local_before,
            remote_before: outcome.remote_before,
            merged: outcome.merged,
            pushed_to: outcome.pushed_to,
            pushed: outcome.pushed,
        }),
        None => Json(RepairResponse {
            ok: false,
            reason: Some("no candidates"),
            local_before: 0,
            remote_before: 0,
            merged: 0,
            pushed_to: None,
            pushed: 0,
        }),
    }
}

async fn control_delay_handler(
    State(state): State<AppState>,
    Json(req): Json<ControlDelayRequest>,
) -> Json<ControlDelayResponse> {
    state.delay_ms.store(req.delay_ms, Ordering::Relaxed);
    Json(ControlDelayResponse {
        status: "ok",
        delay_ms: req.delay_ms,
    })
}

async fn control_clear_delay_handler(State(state): State<AppState>) -> Json<ControlStatusResponse> {
    state.delay_ms.store(0, Ordering::Relaxed);
    Json(ControlStatusResponse { status: "ok" })
}

async fn ring_snapshot_handler(State(state): State<AppState>) -> Json<RingSnapshotResponse> {
    let mut alive_nodes: Vec<String> = state.membership.alive_nodes().into_iter().collect();
    alive_nodes.sort();

    Json(RingSnapshotResponse {
        node: state.node_id.clone(),
        ring: state.ring.ring_snapshot(),
        all_nodes: state.all_nodes.clone(),
        alive_nodes,
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/put/:key", put(put_handler))
        .route("/get/:key", get(get_handler))
        .route("/replicate", put(replicate_handler))
        .route("/get_local/:key", get(get_local_handler))
        .route("/gossip", post(gossip_handler))
        .route("/replicas_for_key/:key", get(replicas_for_key_handler))
        .route("/repair_once/:key", post(repair_once_handler))
        .route("/control/delay", post(control_delay_handler))
        .route("/control/clear_delay", post(control_clear_delay_handler))
        .route("/ring_snapshot", get(ring_snapshot_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
