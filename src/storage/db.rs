use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id               TEXT NOT NULL,
    conversation_id  TEXT NOT NULL,
    sender           TEXT NOT NULL,
    content          TEXT NOT NULL,
    timestamp_ms     INTEGER NOT NULL,
    is_from_business INTEGER NOT NULL DEFAULT 0,
    media_type       TEXT,
    filename         TEXT,
    PRIMARY KEY (id, conversation_id)
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_ts
    ON messages (conversation_id, timestamp_ms);
"#;

/// Open (creating if necessary) the SQLite message store and apply the schema.
///
/// The pool is constructed once at startup and passed into the components that
/// need it; there is no module-level connection singleton.
pub async fn init_db(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    tracing::info!("Connecting to database: {}", database_url);

    if let Some(path_str) = database_url.strip_prefix("sqlite://") {
        let path_str = path_str.split('?').next().unwrap_or(path_str);
        if path_str != ":memory:" {
            let path = std::path::Path::new(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        sqlx::Error::Configuration(
                            format!("failed to create DB directory: {}", e).into(),
                        )
                    })?;
                    tracing::info!("Created database directory: {}", parent.display());
                }
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    tracing::info!("Applied message store schema");

    Ok(pool)
}
