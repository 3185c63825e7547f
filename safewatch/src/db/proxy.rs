use sqlx::{Executor, FromRow, Sqlite, SqlitePool};

#[derive(FromRow, Debug, Clone, PartialEq, Eq)]
pub struct SafeProxy {
    pub id: String,
    pub address: String,
    pub chain: String,
    pub singleton: Option<String>,
    pub owners: String,
    pub threshold: i64,
    pub initializer: Option<String>,
    pub fallback_handler: Option<String>,
    pub guard: Option<String>,
    pub created_at: Option<i64>,
    pub created_block: i64,
}

impl SafeProxy {
    pub fn owners(&self) -> anyhow::Result<Vec<String>> {
        Ok(serde_json::from_str(&self.owners)?)
    }
}

/// Configuration written by a `SafeSetup` event.
#[derive(Debug, Clone)]
pub struct Setup<'a> {
    pub id: &'a str,
    pub address: &'a str,
    pub chain: &'a str,
    pub owners: Vec<String>,
    pub threshold: u64,
    pub initializer: &'a str,
    pub fallback_handler: &'a str,
    pub created_at: i64,
    pub created_block: u64,
}

/// Single column updates applied by the owner management events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyField {
    Threshold(u64),
    Guard(String),
    FallbackHandler(String),
}

/// Records a proxy deployed by the factory. Returns false if it was already known.
pub async fn register(
    conn: &SqlitePool,
    id: &str,
    address: &str,
    chain: &str,
    singleton: &str,
    created_block: u64,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO safe_proxy (id, address, chain, singleton, created_block) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (id) DO NOTHING;",
    )
    .bind(id)
    .bind(address)
    .bind(chain)
    .bind(singleton)
    .bind(created_block as i64)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn setup(conn: &SqlitePool, setup: &Setup<'_>) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO safe_proxy (id, address, chain, owners, threshold, initializer, fallback_handler, created_at, created_block)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            owners = excluded.owners,
            threshold = excluded.threshold,
            initializer = excluded.initializer,
            fallback_handler = excluded.fallback_handler,
            created_at = excluded.created_at;",
    )
    .bind(setup.id)
    .bind(setup.address)
    .bind(setup.chain)
    .bind(serde_json::to_string(&setup.owners)?)
    .bind(setup.threshold as i64)
    .bind(setup.initializer)
    .bind(setup.fallback_handler)
    .bind(setup.created_at)
    .bind(setup.created_block as i64)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(
    conn: impl Executor<'_, Database = Sqlite>,
    id: &str,
) -> anyhow::Result<Option<SafeProxy>> {
    Ok(
        sqlx::query_as::<_, SafeProxy>("SELECT * FROM safe_proxy WHERE id = ?;")
            .bind(id)
            .fetch_optional(conn)
            .await?,
    )
}

pub async fn exists(conn: &SqlitePool, id: &str) -> anyhow::Result<bool> {
    let (exists,) =
        sqlx::query_as::<_, (bool,)>("SELECT EXISTS (SELECT 1 FROM safe_proxy WHERE id = ?);")
            .bind(id)
            .fetch_one(conn)
            .await?;
    Ok(exists)
}

pub async fn set_owners(
    conn: impl Executor<'_, Database = Sqlite>,
    id: &str,
    owners: &[String],
) -> anyhow::Result<()> {
    sqlx::query("UPDATE safe_proxy SET owners = ? WHERE id = ?;")
        .bind(serde_json::to_string(owners)?)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Applies `field` to the proxy `id`. Returns false if no such proxy is known.
pub async fn update(conn: &SqlitePool, id: &str, field: &ProxyField) -> anyhow::Result<bool> {
    let query = match field {
        ProxyField::Threshold(threshold) => {
            sqlx::query("UPDATE safe_proxy SET threshold = ? WHERE id = ?;").bind(*threshold as i64)
        }
        ProxyField::Guard(guard) => {
            sqlx::query("UPDATE safe_proxy SET guard = ? WHERE id = ?;").bind(guard)
        }
        ProxyField::FallbackHandler(handler) => {
            sqlx::query("UPDATE safe_proxy SET fallback_handler = ? WHERE id = ?;").bind(handler)
        }
    };
    let result = query.bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes proxies created at or after `blockheight`.
pub async fn delete_from(conn: &SqlitePool, blockheight: i64) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM safe_proxy WHERE created_block >= ?;")
        .bind(blockheight)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    const ID: &str = "mainnet:0x1111111111111111111111111111111111111111";

    #[tokio::test]
    async fn test_register_then_setup() {
        let pool = db::memory().await;
        assert!(!exists(&pool, ID).await.unwrap());
        assert!(register(&pool, ID, "0x11", "mainnet", "0xsingleton", 100)
            .await
            .unwrap());
        assert!(!register(&pool, ID, "0x11", "mainnet", "0xsingleton", 100)
            .await
            .unwrap());

        setup(
            &pool,
            &Setup {
                id: ID,
                address: "0x11",
                chain: "mainnet",
                owners: vec!["0xa".into(), "0xb".into()],
                threshold: 2,
                initializer: "0xinit",
                fallback_handler: "0xfallback",
                created_at: 1_762_900_000,
                created_block: 100,
            },
        )
        .await
        .unwrap();

        let proxy = find(&pool, ID).await.unwrap().unwrap();
        assert_eq!(proxy.singleton.as_deref(), Some("0xsingleton"));
        assert_eq!(proxy.owners().unwrap(), vec!["0xa", "0xb"]);
        assert_eq!(proxy.threshold, 2);
        assert_eq!(proxy.created_at, Some(1_762_900_000));
    }

    #[tokio::test]
    async fn test_update_fields() {
        let pool = db::memory().await;
        assert!(!update(&pool, ID, &ProxyField::Threshold(3)).await.unwrap());

        register(&pool, ID, "0x11", "mainnet", "0xsingleton", 100)
            .await
            .unwrap();
        update(&pool, ID, &ProxyField::Threshold(3)).await.unwrap();
        update(&pool, ID, &ProxyField::Guard("0xguard".into()))
            .await
            .unwrap();
        set_owners(&pool, ID, &["0xc".into()]).await.unwrap();

        let proxy = find(&pool, ID).await.unwrap().unwrap();
        assert_eq!(proxy.threshold, 3);
        assert_eq!(proxy.guard.as_deref(), Some("0xguard"));
        assert_eq!(proxy.owners().unwrap(), vec!["0xc"]);

        assert_eq!(delete_from(&pool, 100).await.unwrap(), 1);
        assert!(find(&pool, ID).await.unwrap().is_none());
    }
}
