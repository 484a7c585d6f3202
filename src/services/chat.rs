//! Chat service - Handler HTTP per conversazioni e messaggi
//!
//! Gli handler restano sottili: validano l'input, delegano al
//! `MessagingService` e traducono l'esito in risposta HTTP. Ogni handler
//! presuppone il middleware di autenticazione a monte (Extension<UserAccount>).

use crate::core::{AppError, AppState};
use crate::dtos::{MarkReadResponse, Pagination, SendMessageRequest};
use crate::entities::UserAccount;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// GET /chat/conversations?page&limit
#[instrument(skip(state), fields(user_id = %current_user.user_id))]
pub async fn get_conversations(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, _) = pagination.normalize();
    let body = state
        .messaging
        .list_conversations(current_user.user_id, page, limit)
        .await?;
    Ok(Json(body))
}

/// GET /chat/conversations/{conversation_id}
#[instrument(skip(state), fields(user_id = %current_user.user_id, conversation_id = %conversation_id))]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Path(conversation_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let body = state
        .messaging
        .conversation_summary(current_user.user_id, conversation_id)
        .await?;
    Ok(Json(body))
}

/// POST /chat/conversations/user/{user_id} - get-or-create per coppia.
#[instrument(skip(state), fields(user_id = %current_user.user_id, other_user_id = %other_user_id))]
pub async fn get_or_create_conversation(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Path(other_user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let conversation = state
        .messaging
        .get_or_create_conversation(current_user.user_id, other_user_id)
        .await?;
    let body = state
        .messaging
        .conversation_summary(current_user.user_id, conversation.conversation_id)
        .await?;
    Ok(Json(body))
}

/// GET /chat/conversations/{conversation_id}/messages?page&limit
#[instrument(skip(state), fields(user_id = %current_user.user_id, conversation_id = %conversation_id))]
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Path(conversation_id): Path<i64>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let (page, limit, _) = pagination.normalize();
    let body = state
        .messaging
        .list_messages(current_user.user_id, conversation_id, page, limit)
        .await?;
    Ok(Json(body))
}

/// POST /chat/messages - stesso percorso dell'evento `send_message` del gateway.
#[instrument(skip(state, request), fields(user_id = %current_user.user_id))]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Sending message over HTTP");
    let sent = state
        .messaging
        .send_message(current_user.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(sent.message)))
}

/// PATCH /chat/conversations/{conversation_id}/read
#[instrument(skip(state), fields(user_id = %current_user.user_id, conversation_id = %conversation_id))]
pub async fn mark_conversation_read(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Path(conversation_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .messaging
        .mark_conversation_read(current_user.user_id, conversation_id)
        .await?;
    Ok(Json(MarkReadResponse {
        conversation_id: receipt.conversation_id,
        count: receipt.message_ids.len(),
    }))
}

/// DELETE /chat/messages/{message_id} - soft-delete del proprio messaggio.
#[instrument(skip(state), fields(user_id = %current_user.user_id, message_id = %message_id))]
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state
        .messaging
        .delete_message(current_user.user_id, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
