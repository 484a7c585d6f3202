//! UserRepository - Proiezione in sola lettura del servizio identità

use super::traits::UserDirectory;
use crate::core::AppError;
use crate::entities::UserAccount;
use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::{debug, instrument};

const SELECT_COLUMNS: &str =
    "SELECT user_id, username, display_name, is_active, is_deleted FROM users";

pub struct UserRepository {
    connection_pool: MySqlPool,
}

impl UserRepository {
    pub fn new(connection_pool: MySqlPool) -> Self {
        Self { connection_pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn find_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, AppError> {
        let user = sqlx::query_as::<_, UserAccount>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await?;
        debug!(found = user.is_some(), "User lookup by id");
        Ok(user)
    }

    #[instrument(skip(self, user_ids))]
    async fn find_summaries(&self, user_ids: &[i64]) -> Result<Vec<UserAccount>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = sqlx::QueryBuilder::new(format!("{SELECT_COLUMNS} WHERE user_id IN ("));
        let mut separated = builder.separated(", ");
        for id in user_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let users = builder
            .build_query_as::<UserAccount>()
            .fetch_all(&self.connection_pool)
            .await?;
        Ok(users)
    }
}
