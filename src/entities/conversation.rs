use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thread a due partecipanti con stato riassuntivo denormalizzato.
///
/// La coppia è normalizzata (`user_low_id < user_high_id`): l'indice univoco
/// sulla coppia garantisce che esista al massimo una conversazione non
/// cancellata per ogni coppia di utenti, anche sotto creazioni concorrenti.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    pub conversation_id: i64,
    pub user_low_id: i64,
    pub user_high_id: i64,
    pub last_message: Option<String>,
    pub last_message_sender_id: Option<i64>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_low: i64,
    pub unread_high: i64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Normalizza una coppia non ordinata di utenti in (low, high).
    pub fn normalize_pair(a: i64, b: i64) -> (i64, i64) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn participants(&self) -> [i64; 2] {
        [self.user_low_id, self.user_high_id]
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.user_low_id == user_id || self.user_high_id == user_id
    }

    /// L'altro partecipante, se `user_id` è parte della conversazione.
    pub fn other_participant(&self, user_id: i64) -> Option<i64> {
        if user_id == self.user_low_id {
            Some(self.user_high_id)
        } else if user_id == self.user_high_id {
            Some(self.user_low_id)
        } else {
            None
        }
    }

    /// Contatore non-letti dal punto di vista di `user_id`.
    pub fn unread_for(&self, user_id: i64) -> i64 {
        if user_id == self.user_low_id {
            self.unread_low
        } else if user_id == self.user_high_id {
            self.unread_high
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conversation {
        Conversation {
            conversation_id: 7,
            user_low_id: 1,
            user_high_id: 2,
            last_message: None,
            last_message_sender_id: None,
            last_message_at: None,
            unread_low: 3,
            unread_high: 0,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pair_normalization_is_order_independent() {
        assert_eq!(Conversation::normalize_pair(5, 2), (2, 5));
        assert_eq!(Conversation::normalize_pair(2, 5), (2, 5));
    }

    #[test]
    fn other_participant_and_unread() {
        let conv = sample();
        assert_eq!(conv.other_participant(1), Some(2));
        assert_eq!(conv.other_participant(2), Some(1));
        assert_eq!(conv.other_participant(9), None);
        assert_eq!(conv.unread_for(1), 3);
        assert_eq!(conv.unread_for(2), 0);
    }
}
