//! Row types mapped straight from SQLite. Kept apart from the serene-types
//! wire models so the password column never reaches a response type.

pub struct UserRow {
    pub email: String,
    pub full_name: String,
    pub username: String,
    pub phone: String,
    pub password: String,
    pub created_at: String,
}

/// Insert payload for a new user. `password_hash` must already be hashed.
pub struct NewUser<'a> {
    pub email: &'a str,
    pub full_name: &'a str,
    pub username: &'a str,
    pub phone: &'a str,
    pub password_hash: &'a str,
}

pub struct ConversationRow {
    pub id: String,
    pub title: Option<String>,
    pub is_group: bool,
    pub created_at: String,
    pub last_message: Option<String>,
    pub last_message_at: String,
    /// In insertion order (sender first for direct chats).
    pub participants: Vec<String>,
}

impl ConversationRow {
    pub fn has_participant(&self, email: &str) -> bool {
        self.participants.iter().any(|p| p == email)
    }
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub text: String,
    pub sent_at: String,
}
