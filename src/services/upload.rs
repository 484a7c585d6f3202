//! Upload service - Allegati via multipart
//!
//! Salva il file tramite il collaboratore di storage e invia subito un
//! messaggio di tipo image/file che referenzia la chiave salvata: il
//! caricamento senza destinatario non esiste come operazione.

use crate::core::{AppError, AppState};
use crate::dtos::SendMessageRequest;
use crate::entities::{MessageType, UserAccount};
use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

struct UploadForm {
    receiver_id: Option<i64>,
    conversation_id: Option<i64>,
    caption: Option<String>,
    file: Option<(String, String, Vec<u8>)>,
}

/// POST /chat/upload (multipart: `file` obbligatorio, `receiver_id`
/// obbligatorio, `conversation_id` e `content` opzionali).
#[instrument(skip(state, multipart), fields(user_id = %current_user.user_id))]
pub async fn upload_attachment(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<UserAccount>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm {
        receiver_id: None,
        conversation_id: None,
        caption: None,
        file: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed multipart request: {}", e);
        AppError::bad_request("Malformed multipart request")
    })? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .unwrap_or("attachment")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    warn!("Failed to read uploaded file: {}", e);
                    AppError::bad_request("Failed to read uploaded file")
                })?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(AppError::bad_request("File too large"));
                }
                form.file = Some((original_name, content_type, bytes.to_vec()));
            }
            Some("receiver_id") => {
                form.receiver_id = Some(parse_field(field, "receiver_id").await?);
            }
            Some("conversation_id") => {
                form.conversation_id = Some(parse_field(field, "conversation_id").await?);
            }
            Some("content") => {
                form.caption = field.text().await.ok();
            }
            _ => debug!("Ignoring unknown multipart field"),
        }
    }

    let (original_name, content_type, bytes) = form
        .file
        .ok_or_else(|| AppError::bad_request("No file provided"))?;
    let receiver_id = form
        .receiver_id
        .ok_or_else(|| AppError::bad_request("Missing receiver_id"))?;

    let stored = state
        .storage
        .save(&original_name, &content_type, &bytes)
        .await?;

    let message_type = if content_type.starts_with("image/") {
        MessageType::Image
    } else {
        MessageType::File
    };

    let sent = state
        .messaging
        .send_message(
            current_user.user_id,
            SendMessageRequest {
                conversation_id: form.conversation_id,
                receiver_id,
                content: Some(form.caption.unwrap_or_else(|| stored.original_name.clone())),
                message_type: Some(message_type),
                metadata: Some(serde_json::to_value(&stored).map_err(|e| {
                    AppError::internal_server_error("Failed to encode file metadata")
                        .with_details(e.to_string())
                })?),
                temp_id: None,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(sent.message)))
}

async fn parse_field(
    field: axum::extract::multipart::Field<'_>,
    name: &'static str,
) -> Result<i64, AppError> {
    let text = field
        .text()
        .await
        .map_err(|_| AppError::bad_request("Malformed multipart request"))?;
    text.trim().parse::<i64>().map_err(|_| {
        warn!(field = name, "Non-numeric multipart field");
        AppError::bad_request("Invalid numeric field")
    })
}
