//! Status service - Stato online e contatori non-letti
//!
//! Le letture di presenza sono best-effort: un registro irraggiungibile
//! produce 503, mai un falso "online".

use crate::core::{AppError, AppState};
use crate::dtos::{BulkStatusRequest, OnlineStatusDTO, UnreadTotal};
use crate::entities::UserAccount;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

const MAX_BULK_STATUS: usize = 200;

/// GET /chat/online-status/{user_id}
#[instrument(skip(state), fields(caller_id = %current_user.user_id, user_id = %user_id))]
pub async fn get_online_status(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let is_online = state.presence.is_online(user_id).await?;
    Ok(Json(OnlineStatusDTO { user_id, is_online }))
}

/// POST /chat/online-status/bulk
#[instrument(skip(state, request), fields(caller_id = %current_user.user_id))]
pub async fn get_online_status_bulk(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Json(request): Json<BulkStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.user_ids.len() > MAX_BULK_STATUS {
        return Err(AppError::bad_request("Too many user ids requested"));
    }
    let online = state.presence.get_many(&request.user_ids).await?;
    let statuses: Vec<OnlineStatusDTO> = request
        .user_ids
        .iter()
        .map(|&user_id| OnlineStatusDTO {
            user_id,
            is_online: online.get(&user_id).copied().unwrap_or(false),
        })
        .collect();
    Ok(Json(statuses))
}

/// GET /chat/unread-count
#[instrument(skip(state), fields(user_id = %current_user.user_id))]
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
) -> Result<impl IntoResponse, AppError> {
    let total_unread = state.messaging.total_unread(current_user.user_id).await?;
    Ok(Json(UnreadTotal { total_unread }))
}
