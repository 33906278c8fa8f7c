use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS couples (
            id                TEXT PRIMARY KEY,
            couple_code       TEXT NOT NULL UNIQUE CHECK (length(couple_code) = 6),
            partner1_name     TEXT NOT NULL,
            partner2_name     TEXT,
            anniversary_date  TEXT NOT NULL,
            theme_color       TEXT,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            couple_id   TEXT NOT NULL REFERENCES couples(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            completed   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_couple
            ON tasks(couple_id, created_at);

        CREATE TABLE IF NOT EXISTS messages (
            id           TEXT PRIMARY KEY,
            couple_id    TEXT NOT NULL REFERENCES couples(id) ON DELETE CASCADE,
            content      TEXT NOT NULL,
            sender_name  TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_couple
            ON messages(couple_id, created_at);

        CREATE TABLE IF NOT EXISTS mood_entries (
            id            TEXT PRIMARY KEY,
            couple_id     TEXT NOT NULL REFERENCES couples(id) ON DELETE CASCADE,
            partner_name  TEXT NOT NULL,
            mood          TEXT NOT NULL,
            note          TEXT,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_mood_entries_couple
            ON mood_entries(couple_id, created_at);

        CREATE TABLE IF NOT EXISTS bucket_list (
            id            TEXT PRIMARY KEY,
            couple_id     TEXT NOT NULL REFERENCES couples(id) ON DELETE CASCADE,
            title         TEXT NOT NULL,
            category      TEXT NOT NULL,
            priority      TEXT NOT NULL,
            completed     INTEGER NOT NULL DEFAULT 0,
            notes         TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            completed_at  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_bucket_list_couple
            ON bucket_list(couple_id, created_at);

        CREATE TABLE IF NOT EXISTS important_dates (
            id           TEXT PRIMARY KEY,
            couple_id    TEXT NOT NULL REFERENCES couples(id) ON DELETE CASCADE,
            title        TEXT NOT NULL,
            date         TEXT NOT NULL,
            type         TEXT NOT NULL,
            icon         TEXT NOT NULL,
            description  TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_important_dates_couple
            ON important_dates(couple_id, date);

        CREATE TABLE IF NOT EXISTS photos (
            id           TEXT PRIMARY KEY,
            couple_id    TEXT NOT NULL REFERENCES couples(id) ON DELETE CASCADE,
            url          TEXT NOT NULL,
            caption      TEXT,
            date_taken   TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_photos_couple
            ON photos(couple_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
