//! RaidService - raid commands and the event stream
//!
//! Endpoints:
//! - POST /raid.RaidService/StartBattle
//! - POST /raid.RaidService/JoinRaid
//! - POST /raid.RaidService/Move
//! - POST /raid.RaidService/CastSkill
//! - POST /raid.RaidService/Leave
//! - POST /raid.RaidService/FinishBattle
//! - GET  /raids/{raid_id}/events?player_id=  (WebSocket)

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use raid_core::grid::TilePos;
use raid_core::raid::PlayerId;

use super::ApiState;
use crate::channels::Subscription;
use crate::lifecycle::RaidError;
use crate::service::{JoinReply, RaidService};

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/raid.RaidService/StartBattle", post(start_battle))
        .route("/raid.RaidService/JoinRaid", post(join_raid))
        .route("/raid.RaidService/Move", post(move_player))
        .route("/raid.RaidService/CastSkill", post(cast_skill))
        .route("/raid.RaidService/Leave", post(leave))
        .route("/raid.RaidService/FinishBattle", post(finish_battle))
        .route("/raids/{raid_id}/events", get(raid_events))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct StartBattleRequest {
    pub team_id: i64,
}

#[derive(Serialize)]
pub struct StartBattleResponse {
    pub success: bool,
    pub raid_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct JoinRaidRequest {
    pub raid_id: String,
    pub ch_id: Option<PlayerId>,
    #[serde(default)]
    pub is_view: bool,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub raid_id: String,
    pub player_id: PlayerId,
    pub to: TilePos,
}

#[derive(Deserialize)]
pub struct CastSkillRequest {
    pub raid_id: String,
    pub player_id: PlayerId,
    pub skill_id: String,
    pub target: TilePos,
}

#[derive(Deserialize)]
pub struct LeaveRequest {
    pub raid_id: String,
    pub player_id: PlayerId,
}

#[derive(Deserialize)]
pub struct FinishBattleRequest {
    pub team_id: i64,
    pub result: Option<String>,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub player_id: Option<PlayerId>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn start_battle(
    State(state): State<ApiState>,
    Json(req): Json<StartBattleRequest>,
) -> (StatusCode, Json<StartBattleResponse>) {
    match state.service.start_battle(req.team_id).await {
        Ok(raid_id) => (
            StatusCode::OK,
            Json(StartBattleResponse {
                success: true,
                raid_id: Some(raid_id),
                error: None,
            }),
        ),
        Err(e) => {
            let status = match e {
                RaidError::TeamNotFound(_) | RaidError::RaidNotFound(_) => StatusCode::NOT_FOUND,
                RaidError::MapMissing(_) | RaidError::Repository(_) => {
                    warn!(team_id = req.team_id, error = %e, "StartBattle failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (
                status,
                Json(StartBattleResponse {
                    success: false,
                    raid_id: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

async fn join_raid(
    State(state): State<ApiState>,
    Json(req): Json<JoinRaidRequest>,
) -> (StatusCode, Json<JoinReply>) {
    let reply = state.service.join(&req.raid_id, req.ch_id, req.is_view);
    let status = match &reply {
        JoinReply::Error { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (status, Json(reply))
}

async fn move_player(State(state): State<ApiState>, Json(req): Json<MoveRequest>) -> StatusCode {
    state.service.move_player(&req.raid_id, req.player_id, req.to);
    StatusCode::ACCEPTED
}

async fn cast_skill(State(state): State<ApiState>, Json(req): Json<CastSkillRequest>) -> StatusCode {
    state
        .service
        .cast_skill(&req.raid_id, req.player_id, &req.skill_id, req.target);
    StatusCode::ACCEPTED
}

async fn leave(State(state): State<ApiState>, Json(req): Json<LeaveRequest>) -> StatusCode {
    state.service.leave(&req.raid_id, req.player_id);
    StatusCode::ACCEPTED
}

async fn finish_battle(
    State(state): State<ApiState>,
    Json(req): Json<FinishBattleRequest>,
) -> StatusCode {
    state
        .service
        .finish_battle(req.team_id, req.result.as_deref(), req.reason.as_deref());
    StatusCode::ACCEPTED
}

// ============================================================================
// WebSocket event stream
// ============================================================================

async fn raid_events(
    State(state): State<ApiState>,
    Path(raid_id): Path<String>,
    Query(query): Query<EventsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match state.service.subscribe(&raid_id, query.player_id) {
        Ok(sub) => {
            let service = state.service.clone();
            ws.on_upgrade(move |socket| stream_events(socket, sub, service, raid_id, query.player_id))
        }
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

/// Forward events until either side closes; a player's disconnect is a leave
async fn stream_events(
    mut socket: WebSocket,
    mut sub: Subscription,
    service: RaidService,
    raid_id: String,
    player: Option<PlayerId>,
) {
    debug!(raid_id = %raid_id, ?player, "Event stream opened");
    loop {
        tokio::select! {
            next = sub.recv() => {
                let Some(out) = next else { break };
                let text = match serde_json::to_string(&out.event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = out.event.name(), error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!(raid_id = %raid_id, ?player, "Event stream closed");
    if let Some(player) = player {
        service.leave(&raid_id, player);
    }
}
