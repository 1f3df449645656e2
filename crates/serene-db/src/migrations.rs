use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                email       TEXT PRIMARY KEY,
                full_name   TEXT NOT NULL,
                username    TEXT NOT NULL,
                phone       TEXT NOT NULL,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE conversations (
                id               TEXT PRIMARY KEY,
                title            TEXT,
                is_group         INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL,
                last_message     TEXT,
                last_message_at  TEXT NOT NULL
            );

            CREATE INDEX idx_conversations_last_message_at
                ON conversations(last_message_at);

            -- Participants need not be registered users, so no FK on email.
            CREATE TABLE conversation_participants (
                conversation_id  TEXT NOT NULL REFERENCES conversations(id),
                position         INTEGER NOT NULL,
                email            TEXT NOT NULL,
                PRIMARY KEY (conversation_id, position)
            );

            CREATE INDEX idx_participants_email
                ON conversation_participants(email);

            CREATE TABLE messages (
                id               TEXT PRIMARY KEY,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id),
                sender           TEXT NOT NULL,
                text             TEXT NOT NULL,
                sent_at          TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, sent_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
