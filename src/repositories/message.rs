//! MessageRepository - Log ordinato dei messaggi (MySQL)

use super::traits::{MessageStore, NewMessage};
use crate::core::AppError;
use crate::entities::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use tracing::{debug, info, instrument};

const SELECT_COLUMNS: &str = "SELECT message_id, conversation_id, sender_id, receiver_id, content, \
     message_type, status, delivered_at, read_at, metadata, is_deleted, created_at \
     FROM messages";

pub struct MessageRepository {
    connection_pool: MySqlPool,
}

impl MessageRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }

    async fn fetch_by_id(&self, message_id: i64) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "{SELECT_COLUMNS} WHERE message_id = ?"
        ))
        .bind(message_id)
        .fetch_one(&self.connection_pool)
        .await?;
        Ok(message)
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[instrument(skip(self, data), fields(conversation_id = %data.conversation_id))]
    async fn insert(&self, data: &NewMessage) -> Result<Message, AppError> {
        // created_at lo assegna il database: è la chiave di ordinamento e non
        // ci fidiamo di alcun timestamp fornito dal client.
        let result = sqlx::query(
            "INSERT INTO messages \
                 (conversation_id, sender_id, receiver_id, content, message_type, metadata) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(data.conversation_id)
        .bind(data.sender_id)
        .bind(data.receiver_id)
        .bind(&data.content)
        .bind(data.message_type)
        .bind(data.metadata.as_ref())
        .execute(&self.connection_pool)
        .await?;

        let new_id = result.last_insert_id() as i64;
        info!(message_id = new_id, "Message persisted");
        self.fetch_by_id(new_id).await
    }

    #[instrument(skip(self), fields(message_id = %message_id))]
    async fn find_by_id(
        &self,
        message_id: i64,
        include_deleted: bool,
    ) -> Result<Option<Message>, AppError> {
        let query = if include_deleted {
            format!("{SELECT_COLUMNS} WHERE message_id = ?")
        } else {
            format!("{SELECT_COLUMNS} WHERE message_id = ? AND is_deleted = FALSE")
        };
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(message_id)
            .fetch_optional(&self.connection_pool)
            .await?;
        Ok(message)
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    async fn list_paginated(
        &self,
        conversation_id: i64,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<Message>, AppError> {
        let deleted_filter = if include_deleted {
            ""
        } else {
            "AND is_deleted = FALSE"
        };
        let query = format!(
            "{SELECT_COLUMNS} WHERE conversation_id = ? {deleted_filter} \
             ORDER BY created_at DESC, message_id DESC \
             LIMIT ? OFFSET ?"
        );
        let messages = sqlx::query_as::<_, Message>(&query)
            .bind(conversation_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.connection_pool)
            .await?;
        debug!(count = messages.len(), "Messages fetched");
        Ok(messages)
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id, reader_id = %reader_id))]
    async fn mark_conversation_read(
        &self,
        conversation_id: i64,
        reader_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT message_id FROM messages \
             WHERE conversation_id = ? AND receiver_id = ? \
               AND status <> 'READ' AND is_deleted = FALSE \
             ORDER BY message_id",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .fetch_all(&self.connection_pool)
        .await?;

        if ids.is_empty() {
            debug!("Nothing to mark as read");
            return Ok(ids);
        }

        // read_at si imposta una sola volta, alla prima transizione.
        let mut builder = sqlx::QueryBuilder::new(
            "UPDATE messages SET status = 'READ', read_at = ",
        );
        builder.push_bind(at);
        builder.push(" WHERE status <> 'READ' AND message_id IN (");
        let mut separated = builder.separated(", ");
        for id in &ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        builder.build().execute(&self.connection_pool).await?;

        info!(count = ids.len(), "Messages transitioned to READ");
        Ok(ids)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn mark_delivered_for_receiver(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        // Passaggio globale, non per-conversazione: alla connessione tutti i
        // messaggi pendenti dell'utente diventano DELIVERED in un colpo solo.
        let result = sqlx::query(
            "UPDATE messages SET status = 'DELIVERED', delivered_at = ? \
             WHERE receiver_id = ? AND status = 'SENT' AND is_deleted = FALSE",
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.connection_pool)
        .await?;

        let count = result.rows_affected();
        if count > 0 {
            info!(count, "Pending messages marked as delivered");
        }
        Ok(count)
    }

    #[instrument(skip(self), fields(message_id = %message_id, sender_id = %sender_id))]
    async fn soft_delete(&self, message_id: i64, sender_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_deleted = TRUE \
             WHERE message_id = ? AND sender_id = ? AND is_deleted = FALSE",
        )
        .bind(message_id)
        .bind(sender_id)
        .execute(&self.connection_pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
