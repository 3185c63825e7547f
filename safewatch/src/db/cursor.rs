use sqlx::{Executor, Sqlite, SqlitePool};

/// Position of the last event processed for `chain`.
pub async fn get(conn: &SqlitePool, chain: &str) -> anyhow::Result<Option<(u64, u64)>> {
    let cursor = sqlx::query_as::<_, (i64, i64)>(
        "SELECT block_number, log_index FROM chain_cursor WHERE chain = ?;",
    )
    .bind(chain)
    .fetch_optional(conn)
    .await?;

    Ok(cursor.map(|(block, log)| (block as u64, log as u64)))
}

pub async fn advance(
    conn: impl Executor<'_, Database = Sqlite>,
    chain: &str,
    (block_number, log_index): (u64, u64),
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO chain_cursor (chain, block_number, log_index) VALUES (?, ?, ?)
        ON CONFLICT (chain) DO UPDATE SET block_number = excluded.block_number, log_index = excluded.log_index;",
    )
    .bind(chain)
    .bind(block_number as i64)
    .bind(log_index as i64)
    .execute(conn)
    .await?;
    Ok(())
}

/// Moves every cursor at or past `blockheight` back to the end of the previous block.
pub async fn rewind(
    conn: impl Executor<'_, Database = Sqlite>,
    blockheight: i64,
) -> anyhow::Result<()> {
    if blockheight <= 0 {
        sqlx::query("DELETE FROM chain_cursor;").execute(conn).await?;
        return Ok(());
    }

    sqlx::query(
        "UPDATE chain_cursor SET block_number = ? - 1, log_index = ? WHERE block_number >= ?;",
    )
    .bind(blockheight)
    .bind(i64::MAX)
    .bind(blockheight)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn all(conn: &SqlitePool) -> anyhow::Result<Vec<(String, i64, i64)>> {
    Ok(sqlx::query_as::<_, (String, i64, i64)>(
        "SELECT chain, block_number, log_index FROM chain_cursor ORDER BY chain;",
    )
    .fetch_all(conn)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_advance_and_rewind() {
        let pool = db::memory().await;
        assert_eq!(get(&pool, "mainnet").await.unwrap(), None);

        advance(&pool, "mainnet", (100, 4)).await.unwrap();
        advance(&pool, "mainnet", (120, 0)).await.unwrap();
        advance(&pool, "worldchain", (50, 1)).await.unwrap();
        assert_eq!(get(&pool, "mainnet").await.unwrap(), Some((120, 0)));

        rewind(&pool, 110).await.unwrap();
        assert_eq!(
            get(&pool, "mainnet").await.unwrap(),
            Some((109, i64::MAX as u64))
        );
        assert_eq!(get(&pool, "worldchain").await.unwrap(), Some((50, 1)));

        rewind(&pool, 0).await.unwrap();
        assert!(all(&pool).await.unwrap().is_empty());
    }
}
