use crate::config::Config;

use sqlx::SqlitePool;

pub mod balance;
pub mod cursor;
pub mod event_log;
pub mod history;
pub mod proxy;
pub mod stats;

static MIGRATIONS: [&str; 10] = [
    "CREATE TABLE event_log (id INTEGER PRIMARY KEY, created_at, type, data);",
    "CREATE TABLE chain_cursor (chain TEXT PRIMARY KEY, block_number INTEGER NOT NULL, log_index INTEGER NOT NULL);",
    "CREATE TABLE safe_proxy (id TEXT PRIMARY KEY, address TEXT NOT NULL, chain TEXT NOT NULL, singleton, owners TEXT NOT NULL DEFAULT '[]', threshold INTEGER NOT NULL DEFAULT 0, initializer, fallback_handler, guard, created_at INTEGER, created_block INTEGER NOT NULL);",

    // Balances are decimal text, they do not fit in a sqlite INTEGER.
    "CREATE TABLE token_balance (id TEXT PRIMARY KEY, safe_address TEXT NOT NULL, token_address TEXT NOT NULL, chain TEXT NOT NULL, balance TEXT NOT NULL, updated_at INTEGER NOT NULL);",
    "CREATE TABLE balance_history (id TEXT PRIMARY KEY, safe_address TEXT NOT NULL, token_address TEXT NOT NULL, chain TEXT NOT NULL, balance TEXT NOT NULL, change TEXT NOT NULL, block_number INTEGER NOT NULL, block_timestamp INTEGER NOT NULL, transaction_hash TEXT NOT NULL, log_index INTEGER NOT NULL);",
    "CREATE INDEX balance_history_account_idx ON balance_history (safe_address, chain, token_address, block_timestamp);",
    "CREATE INDEX balance_history_block_idx ON balance_history (chain, block_number, log_index);",
    "CREATE VIEW ranked_history_vw AS
        SELECT *, row_number() OVER (
            PARTITION BY chain, safe_address, token_address
            ORDER BY block_number DESC, log_index DESC
        ) AS row_rank
        FROM balance_history;",
    "CREATE VIEW latest_history_vw AS
        SELECT * FROM ranked_history_vw WHERE row_rank = 1;",
    "CREATE INDEX safe_proxy_block_idx ON safe_proxy (chain, created_block);",
];

pub async fn initialize(config: &Config) -> anyhow::Result<SqlitePool> {
    let conn = config.sqlite().await?;
    migrate(&conn).await?;
    Ok(conn)
}

pub async fn migrate(conn: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema (version);")
        .execute(conn)
        .await?;

    let (version,) =
        sqlx::query_as::<_, (i64,)>("SELECT COALESCE(MAX(version) + 1, 0) FROM schema;")
            .fetch_one(conn)
            .await?;

    for (idx, migration) in MIGRATIONS[version as usize..].iter().enumerate() {
        let version = idx as i64 + version;
        let mut tx = conn.begin().await?;
        tracing::debug!("Migrations schema version {version}");
        sqlx::query(migration).execute(&mut tx).await?;
        sqlx::query("INSERT INTO schema (version) VALUES (?);")
            .bind(version)
            .execute(&mut tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}

/// Single-connection in-memory database with all migrations applied.
#[cfg(test)]
pub async fn memory() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory().await;
        migrate(&pool).await.unwrap();
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM schema;")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }
}
