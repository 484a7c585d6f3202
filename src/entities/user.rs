use serde::{Deserialize, Serialize};

/// Proiezione in sola lettura dell'utente gestito dal servizio identità.
/// Il motore di messaggistica non scrive mai su questa tabella.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct UserAccount {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl UserAccount {
    /// Un utente può inviare/ricevere solo se attivo e non cancellato.
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_deleted
    }
}
