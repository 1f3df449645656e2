use std::collections::HashMap;

use crate::models::{ConversationRow, MessageRow, NewUser, UserRow};
use crate::{Database, DbError};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, ErrorCode};

impl Database {
    // -- Users --

    /// Fails with [`DbError::Duplicate`] when the email is already registered.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let created_at = self.next_timestamp();
            let inserted = conn.execute(
                "INSERT INTO users (email, full_name, username, phone, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.email,
                    user.full_name,
                    user.username,
                    user.phone,
                    user.password_hash,
                    created_at
                ],
            );

            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(DbError::Duplicate.into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn user_exists(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Conversations --

    /// Create a conversation and its first message in one transaction.
    /// Returns the write timestamp shared by both records.
    pub fn create_conversation(
        &self,
        conversation_id: &str,
        participants: &[&str],
        message_id: &str,
        sender: &str,
        text: &str,
    ) -> Result<String> {
        self.with_conn_mut(|conn| {
            let now = self.next_timestamp();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO conversations (id, title, is_group, created_at, last_message, last_message_at)
                 VALUES (?1, NULL, 0, ?2, ?3, ?2)",
                rusqlite::params![conversation_id, now, text],
            )?;

            for (position, email) in participants.iter().enumerate() {
                tx.execute(
                    "INSERT INTO conversation_participants (conversation_id, position, email)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![conversation_id, position as i64, email],
                )?;
            }

            insert_message(&tx, message_id, conversation_id, sender, text, &now)?;
            tx.commit()?;

            Ok(now)
        })
    }

    /// Patch the conversation's last-message fields and append the message in
    /// one transaction. Returns `None`, writing nothing, if the conversation
    /// does not exist.
    pub fn append_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        sender: &str,
        text: &str,
    ) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let now = self.next_timestamp();
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE conversations SET last_message = ?2, last_message_at = ?3 WHERE id = ?1",
                rusqlite::params![conversation_id, text, now],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            insert_message(&tx, message_id, conversation_id, sender, text, &now)?;
            tx.commit()?;

            Ok(Some(now))
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, is_group, created_at, last_message, last_message_at
                     FROM conversations WHERE id = ?1",
                    [id],
                    map_conversation,
                )
                .optional()?;

            let Some(mut conversation) = row else {
                return Ok(None);
            };
            let mut participants = query_participants(conn, &[conversation.id.clone()])?;
            conversation.participants = participants.remove(&conversation.id).unwrap_or_default();
            Ok(Some(conversation))
        })
    }

    /// Conversations `email` participates in, most recently active first.
    pub fn list_conversations_for(&self, email: &str, limit: u32) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.title, c.is_group, c.created_at, c.last_message, c.last_message_at
                 FROM conversations c
                 WHERE c.id IN (SELECT conversation_id FROM conversation_participants WHERE email = ?1)
                 ORDER BY c.last_message_at DESC, c.rowid DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt
                .query_map(rusqlite::params![email, limit], map_conversation)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
            let mut participants = query_participants(conn, &ids)?;
            for row in &mut rows {
                row.participants = participants.remove(&row.id).unwrap_or_default();
            }

            Ok(rows)
        })
    }

    // -- Messages --

    /// The newest `limit` messages of a conversation, returned oldest-first.
    pub fn get_recent_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender, text, sent_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY sent_at DESC, rowid DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt
                .query_map(rusqlite::params![conversation_id, limit], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender: row.get(2)?,
                        text: row.get(3)?,
                        sent_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.reverse();
            Ok(rows)
        })
    }
}

fn insert_message(
    conn: &Connection,
    id: &str,
    conversation_id: &str,
    sender: &str,
    text: &str,
    sent_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender, text, sent_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id, conversation_id, sender, text, sent_at],
    )?;
    Ok(())
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT email, full_name, username, phone, password, created_at FROM users WHERE email = ?1",
    )?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                email: row.get(0)?,
                full_name: row.get(1)?,
                username: row.get(2)?,
                phone: row.get(3)?,
                password: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Participants come back empty; callers fill them from `query_participants`.
fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        title: row.get(1)?,
        is_group: row.get(2)?,
        created_at: row.get(3)?,
        last_message: row.get(4)?,
        last_message_at: row.get(5)?,
        participants: Vec::new(),
    })
}

/// Batch-fetch participant lists keyed by conversation id, each in position order.
fn query_participants(conn: &Connection, conversation_ids: &[String]) -> Result<HashMap<String, Vec<String>>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    if conversation_ids.is_empty() {
        return Ok(out);
    }

    let placeholders: Vec<String> = (1..=conversation_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT conversation_id, email FROM conversation_participants
         WHERE conversation_id IN ({})
         ORDER BY conversation_id, position",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(conversation_ids.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    for row in rows {
        let (conversation_id, email) = row?;
        out.entry(conversation_id).or_default().push(email);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn register(db: &Database, email: &str) {
        db.create_user(&NewUser {
            email,
            full_name: "Test User",
            username: "tester",
            phone: "555-0100",
            password_hash: "$argon2id$placeholder",
        })
        .unwrap();
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "ana@example.com");

        let err = db
            .create_user(&NewUser {
                email: "ana@example.com",
                full_name: "Someone Else",
                username: "other",
                phone: "",
                password_hash: "x",
            })
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::Duplicate)));

        let user = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(user.full_name, "Test User");
        assert!(db.user_exists("ana@example.com").unwrap());
        assert!(!db.user_exists("ben@example.com").unwrap());
    }

    #[test]
    fn new_conversation_holds_both_participants_and_first_message() {
        let db = Database::open_in_memory().unwrap();
        let cid = new_id();
        let mid = new_id();

        let sent_at = db
            .create_conversation(&cid, &["ana@example.com", "ben@example.com"], &mid, "ana@example.com", "hi ben")
            .unwrap();

        let conv = db.get_conversation(&cid).unwrap().unwrap();
        assert_eq!(conv.participants, vec!["ana@example.com", "ben@example.com"]);
        assert_eq!(conv.last_message.as_deref(), Some("hi ben"));
        assert_eq!(conv.last_message_at, sent_at);
        assert_eq!(conv.created_at, sent_at);
        assert!(!conv.is_group);
        assert!(conv.title.is_none());

        let msgs = db.get_recent_messages(&cid, 50).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, mid);
        assert_eq!(msgs[0].sender, "ana@example.com");
        assert_eq!(msgs[0].sent_at, sent_at);
    }

    #[test]
    fn append_updates_summary_and_missing_conversation_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let cid = new_id();
        db.create_conversation(&cid, &["ana@example.com", "ben@example.com"], &new_id(), "ana@example.com", "one")
            .unwrap();

        let at = db
            .append_message(&cid, &new_id(), "ben@example.com", "two")
            .unwrap()
            .unwrap();
        let conv = db.get_conversation(&cid).unwrap().unwrap();
        assert_eq!(conv.last_message.as_deref(), Some("two"));
        assert_eq!(conv.last_message_at, at);
        assert!(conv.last_message_at > conv.created_at);

        let missing = new_id();
        assert!(db.append_message(&missing, &new_id(), "ana@example.com", "lost").unwrap().is_none());
        assert!(db.get_recent_messages(&missing, 50).unwrap().is_empty());
        assert!(db.get_conversation(&missing).unwrap().is_none());
    }

    #[test]
    fn recent_messages_are_newest_window_in_ascending_order() {
        let db = Database::open_in_memory().unwrap();
        let cid = new_id();
        db.create_conversation(&cid, &["ana@example.com", "ben@example.com"], &new_id(), "ana@example.com", "m0")
            .unwrap();
        for i in 1..5 {
            db.append_message(&cid, &new_id(), "ana@example.com", &format!("m{}", i))
                .unwrap()
                .unwrap();
        }

        let texts: Vec<String> = db
            .get_recent_messages(&cid, 3)
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);

        assert_eq!(db.get_recent_messages(&cid, 10).unwrap().len(), 5);
    }

    #[test]
    fn conversations_filtered_by_participant_and_ordered_by_activity() {
        let db = Database::open_in_memory().unwrap();
        let first = new_id();
        let second = new_id();
        let unrelated = new_id();

        db.create_conversation(&first, &["ana@example.com", "ben@example.com"], &new_id(), "ana@example.com", "a")
            .unwrap();
        db.create_conversation(&second, &["cal@example.com", "ana@example.com"], &new_id(), "cal@example.com", "b")
            .unwrap();
        db.create_conversation(&unrelated, &["ben@example.com", "cal@example.com"], &new_id(), "ben@example.com", "c")
            .unwrap();
        db.append_message(&first, &new_id(), "ben@example.com", "latest")
            .unwrap()
            .unwrap();

        let listed = db.list_conversations_for("ana@example.com", 50).unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str()]);
        assert_eq!(listed[0].last_message.as_deref(), Some("latest"));
        assert_eq!(listed[1].participants, vec!["cal@example.com", "ana@example.com"]);

        assert_eq!(db.list_conversations_for("ana@example.com", 1).unwrap().len(), 1);
        assert!(db.list_conversations_for("nobody@example.com", 50).unwrap().is_empty());
    }

    #[test]
    fn write_timestamps_strictly_increase() {
        let db = Database::open_in_memory().unwrap();
        let stamps: Vec<String> = (0..100).map(|_| db.next_timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
