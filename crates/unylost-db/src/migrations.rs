use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name               TEXT NOT NULL,
                email                   TEXT NOT NULL UNIQUE,
                password                TEXT NOT NULL,
                phone_number            TEXT,
                address                 TEXT,
                role                    TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                is_verified             INTEGER NOT NULL DEFAULT 0,
                verification_token      TEXT,
                reset_password_token    TEXT,
                reset_password_expires  TEXT,
                last_login              TEXT,
                created_at              TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at              TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE categories (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                description TEXT,
                icon        TEXT,
                priority    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE found_items (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id      INTEGER NOT NULL REFERENCES users(id),
                category_id  INTEGER NOT NULL REFERENCES categories(id),
                item_name    TEXT NOT NULL,
                description  TEXT,
                location     TEXT NOT NULL,
                found_date   TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'pending',
                image_url    TEXT,
                firestore_id TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_found_items_user ON found_items(user_id);
            CREATE INDEX idx_found_items_category ON found_items(category_id);
            CREATE INDEX idx_found_items_firestore ON found_items(firestore_id);

            CREATE TABLE found_item_images (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                found_item_id INTEGER NOT NULL REFERENCES found_items(id) ON DELETE CASCADE,
                image_url     TEXT NOT NULL,
                is_primary    INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_found_item_images_item ON found_item_images(found_item_id);

            CREATE TABLE lost_items (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id            INTEGER NOT NULL REFERENCES users(id),
                category_id        INTEGER NOT NULL REFERENCES categories(id),
                item_name          TEXT NOT NULL,
                description        TEXT,
                last_seen_location TEXT NOT NULL,
                lost_date          TEXT NOT NULL,
                reward             TEXT,
                status             TEXT NOT NULL DEFAULT 'active',
                image_url          TEXT,
                firestore_id       TEXT,
                needs_sync         INTEGER NOT NULL DEFAULT 0,
                last_sync_attempt  TEXT,
                sync_error         TEXT,
                created_at         TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at         TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_lost_items_user ON lost_items(user_id);
            CREATE INDEX idx_lost_items_category ON lost_items(category_id);
            CREATE INDEX idx_lost_items_firestore ON lost_items(firestore_id);

            CREATE TABLE item_claims (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          INTEGER NOT NULL REFERENCES users(id),
                item_id          INTEGER NOT NULL REFERENCES found_items(id) ON DELETE CASCADE,
                description      TEXT NOT NULL,
                lost_location    TEXT,
                lost_date        TEXT,
                additional_proof TEXT,
                status           TEXT NOT NULL DEFAULT 'pending',
                admin_notes      TEXT,
                created_at       TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_item_claims_item ON item_claims(item_id, status);
            CREATE UNIQUE INDEX idx_item_claims_user_item ON item_claims(user_id, item_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
