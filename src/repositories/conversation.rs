//! ConversationRepository - Store durevole delle conversazioni (MySQL)

use super::traits::ConversationStore;
use crate::core::AppError;
use crate::entities::Conversation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use tracing::{debug, info, instrument, warn};

const SELECT_COLUMNS: &str = "SELECT conversation_id, user_low_id, user_high_id, last_message, \
     last_message_sender_id, last_message_at, unread_low, unread_high, \
     is_deleted, created_at FROM conversations";

pub struct ConversationRepository {
    connection_pool: MySqlPool,
}

impl ConversationRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    async fn fetch_by_id(&self, conversation_id: i64) -> Result<Conversation, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "{SELECT_COLUMNS} WHERE conversation_id = ?"
        ))
        .bind(conversation_id)
        .fetch_one(&self.connection_pool)
        .await?;
        Ok(conversation)
    }

    /// Riattiva una riga soft-deleted: l'invariante è al massimo una
    /// conversazione non cancellata per coppia, mai una seconda riga.
    async fn revive(&self, conversation_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE conversations SET is_deleted = FALSE WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.connection_pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for ConversationRepository {
    #[instrument(skip(self), fields(a = %a, b = %b))]
    async fn find_pair(
        &self,
        a: i64,
        b: i64,
        include_deleted: bool,
    ) -> Result<Option<Conversation>, AppError> {
        let (low, high) = Conversation::normalize_pair(a, b);
        let query = if include_deleted {
            format!("{SELECT_COLUMNS} WHERE user_low_id = ? AND user_high_id = ?")
        } else {
            format!(
                "{SELECT_COLUMNS} WHERE user_low_id = ? AND user_high_id = ? AND is_deleted = FALSE"
            )
        };
        let conversation = sqlx::query_as::<_, Conversation>(&query)
            .bind(low)
            .bind(high)
            .fetch_optional(&self.connection_pool)
            .await?;
        Ok(conversation)
    }

    #[instrument(skip(self), fields(a = %a, b = %b))]
    async fn get_or_create_pair(&self, a: i64, b: i64) -> Result<Conversation, AppError> {
        let (low, high) = Conversation::normalize_pair(a, b);

        if let Some(existing) = self.find_pair(low, high, true).await? {
            if existing.is_deleted {
                debug!("Reviving soft-deleted conversation for pair");
                self.revive(existing.conversation_id).await?;
                return self.fetch_by_id(existing.conversation_id).await;
            }
            return Ok(existing);
        }

        let inserted = sqlx::query(
            "INSERT INTO conversations (user_low_id, user_high_id) VALUES (?, ?)",
        )
        .bind(low)
        .bind(high)
        .execute(&self.connection_pool)
        .await;

        match inserted {
            Ok(result) => {
                let id = result.last_insert_id() as i64;
                info!(conversation_id = id, "Conversation created for pair");
                self.fetch_by_id(id).await
            }
            // Creazione concorrente per la stessa coppia: l'indice univoco ha
            // vinto per l'altro chiamante, convergiamo sulla sua riga.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!("Concurrent creation detected, converging on existing row");
                let existing = self
                    .find_pair(low, high, true)
                    .await?
                    .ok_or_else(|| AppError::conflict("Conversation creation race lost"))?;
                if existing.is_deleted {
                    self.revive(existing.conversation_id).await?;
                    return self.fetch_by_id(existing.conversation_id).await;
                }
                Ok(existing)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    async fn find_by_id(
        &self,
        conversation_id: i64,
        include_deleted: bool,
    ) -> Result<Option<Conversation>, AppError> {
        let query = if include_deleted {
            format!("{SELECT_COLUMNS} WHERE conversation_id = ?")
        } else {
            format!("{SELECT_COLUMNS} WHERE conversation_id = ? AND is_deleted = FALSE")
        };
        let conversation = sqlx::query_as::<_, Conversation>(&query)
            .bind(conversation_id)
            .fetch_optional(&self.connection_pool)
            .await?;
        Ok(conversation)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_for_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<Conversation>, AppError> {
        let deleted_filter = if include_deleted {
            ""
        } else {
            "AND is_deleted = FALSE"
        };
        let query = format!(
            "{SELECT_COLUMNS} WHERE (user_low_id = ? OR user_high_id = ?) {deleted_filter} \
             ORDER BY COALESCE(last_message_at, created_at) DESC, conversation_id DESC \
             LIMIT ? OFFSET ?"
        );
        let conversations = sqlx::query_as::<_, Conversation>(&query)
            .bind(user_id)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.connection_pool)
            .await?;
        debug!(count = conversations.len(), "Conversations listed");
        Ok(conversations)
    }

    #[instrument(skip(self, preview), fields(conversation_id = %conversation_id))]
    async fn record_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        receiver_id: i64,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        // Un solo UPDATE: riassunto + incremento del lato ricevente, atomico
        // anche con due mittenti concorrenti verso lo stesso utente.
        let result = sqlx::query(
            "UPDATE conversations SET \
                 last_message = ?, \
                 last_message_sender_id = ?, \
                 last_message_at = ?, \
                 unread_low = unread_low + IF(user_low_id = ?, 1, 0), \
                 unread_high = unread_high + IF(user_high_id = ?, 1, 0) \
             WHERE conversation_id = ?",
        )
        .bind(preview)
        .bind(sender_id)
        .bind(at)
        .bind(receiver_id)
        .bind(receiver_id)
        .bind(conversation_id)
        .execute(&self.connection_pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!("record_message touched no rows");
            return Err(AppError::not_found("Conversation not found"));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id, user_id = %user_id))]
    async fn reset_unread(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE conversations SET \
                 unread_low = IF(user_low_id = ?, 0, unread_low), \
                 unread_high = IF(user_high_id = ?, 0, unread_high) \
             WHERE conversation_id = ?",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(conversation_id)
        .execute(&self.connection_pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn total_unread(&self, user_id: i64) -> Result<i64, AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT CAST(COALESCE(SUM(IF(user_low_id = ?, unread_low, unread_high)), 0) AS SIGNED) \
             FROM conversations \
             WHERE (user_low_id = ? OR user_high_id = ?) AND is_deleted = FALSE",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.connection_pool)
        .await?;
        Ok(total)
    }
}
