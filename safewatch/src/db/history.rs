use safewatch_core::{Address, AggregateError, BalanceRecord, RawBalanceRecord};
use serde_json::Value;
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};

#[derive(FromRow, Debug, Clone)]
pub struct HistoryRow {
    pub id: String,
    pub safe_address: String,
    pub token_address: String,
    pub chain: String,
    pub balance: String,
    pub change: String,
    pub block_number: i64,
    pub block_timestamp: i64,
    pub transaction_hash: String,
    pub log_index: i64,
}

impl From<HistoryRow> for RawBalanceRecord {
    fn from(row: HistoryRow) -> Self {
        RawBalanceRecord {
            id: row.id,
            safe_address: row.safe_address,
            token_address: row.token_address,
            chain: row.chain,
            balance: Value::String(row.balance),
            change: Value::String(row.change),
            block_number: row.block_number.into(),
            block_timestamp: row.block_timestamp.into(),
            transaction_hash: row.transaction_hash,
            log_index: row.log_index.into(),
        }
    }
}

impl TryFrom<HistoryRow> for BalanceRecord {
    type Error = AggregateError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        BalanceRecord::try_from(RawBalanceRecord::from(row))
    }
}

/// Filter for one Safe's history on one chain.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub safe_address: Address,
    pub token_address: Option<Address>,
    pub chain: String,
    pub limit: u32,
}

/// Inserts `record` unless a row with the same id exists. Returns whether it was inserted.
pub async fn insert(
    conn: impl Executor<'_, Database = Sqlite>,
    record: &BalanceRecord,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "INSERT INTO balance_history
        (id, safe_address, token_address, chain, balance, change, block_number, block_timestamp, transaction_hash, log_index)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO NOTHING;",
    )
    .bind(&record.id)
    .bind(&record.safe_address)
    .bind(&record.token_address)
    .bind(&record.chain)
    .bind(record.balance.to_string())
    .bind(record.change.to_string())
    .bind(record.block_number as i64)
    .bind(record.block_timestamp)
    .bind(&record.transaction_hash)
    .bind(record.log_index as i64)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// The most recent rows matching `filter`, newest first.
pub async fn recent(
    conn: &SqlitePool,
    filter: &HistoryFilter,
) -> anyhow::Result<Vec<BalanceRecord>> {
    let token = filter.token_address.as_ref().map(Address::as_str);
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT * FROM balance_history
        WHERE safe_address = ? AND chain = ? AND (? IS NULL OR token_address = ?)
        ORDER BY block_timestamp DESC, block_number DESC, log_index DESC
        LIMIT ?;",
    )
    .bind(filter.safe_address.as_str())
    .bind(&filter.chain)
    .bind(token)
    .bind(token)
    .bind(filter.limit)
    .fetch_all(conn)
    .await?;

    let records = rows
        .into_iter()
        .map(BalanceRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Number of rows matching `filter`, ignoring its limit.
pub async fn count(conn: &SqlitePool, filter: &HistoryFilter) -> anyhow::Result<i64> {
    let token = filter.token_address.as_ref().map(Address::as_str);
    let (count,) = sqlx::query_as::<_, (i64,)>(
        "SELECT count(*) FROM balance_history
        WHERE safe_address = ? AND chain = ? AND (? IS NULL OR token_address = ?);",
    )
    .bind(filter.safe_address.as_str())
    .bind(&filter.chain)
    .bind(token)
    .bind(token)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// The last row at or before `timestamp` for one balance.
pub async fn balance_at(
    conn: &SqlitePool,
    safe_address: &Address,
    token_address: &Address,
    chain: &str,
    timestamp: i64,
) -> anyhow::Result<Option<BalanceRecord>> {
    let row = sqlx::query_as::<_, HistoryRow>(
        "SELECT * FROM balance_history
        WHERE safe_address = ? AND token_address = ? AND chain = ? AND block_timestamp <= ?
        ORDER BY block_number DESC, log_index DESC
        LIMIT 1;",
    )
    .bind(safe_address.as_str())
    .bind(token_address.as_str())
    .bind(chain)
    .bind(timestamp)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(BalanceRecord::try_from).transpose()?)
}

/// Deletes every row at or after `blockheight`, returning how many were removed.
pub async fn delete_from(conn: &SqlitePool, blockheight: i64) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM balance_history WHERE block_number >= ?;")
        .bind(blockheight)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::db;

    pub const SAFE: &str = "0x6dd09d21b535d5bcee36fec8f50726f0f0e6725b";

    pub fn record(
        id: &str,
        balance: i128,
        change: i128,
        block: u64,
        timestamp: i64,
    ) -> BalanceRecord {
        BalanceRecord {
            id: id.into(),
            safe_address: SAFE.into(),
            token_address: Address::native().to_string(),
            chain: "mainnet".into(),
            balance,
            change,
            block_number: block,
            block_timestamp: timestamp,
            transaction_hash: format!("0x{id:0>64}"),
            log_index: 0,
        }
    }

    fn filter(limit: u32) -> HistoryFilter {
        HistoryFilter {
            safe_address: SAFE.parse().unwrap(),
            token_address: None,
            chain: "mainnet".into(),
            limit,
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let pool = db::memory().await;
        let r = record("1", 10, 10, 100, 1_000);
        assert!(insert(&pool, &r).await.unwrap());
        assert!(!insert(&pool, &r).await.unwrap());
        assert_eq!(count(&pool, &filter(10)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recent_newest_first_with_limit() {
        let pool = db::memory().await;
        insert(&pool, &record("1", 10, 10, 100, 1_000)).await.unwrap();
        insert(&pool, &record("2", 30, 20, 101, 2_000)).await.unwrap();
        insert(&pool, &record("3", 25, -5, 102, 3_000)).await.unwrap();

        let rows = recent(&pool, &filter(2)).await.unwrap();
        assert_eq!(
            rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["3", "2"]
        );
        assert_eq!(rows[0].change, -5);
        assert_eq!(count(&pool, &filter(2)).await.unwrap(), 3);

        let mut other_token = filter(10);
        other_token.token_address =
            Some("0x1111111111111111111111111111111111111111".parse().unwrap());
        assert!(recent(&pool, &other_token).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_big_balances_survive_storage() {
        let pool = db::memory().await;
        let big = i128::from(u64::MAX) * 1_000;
        insert(&pool, &record("1", big, big, 100, 1_000)).await.unwrap();
        let rows = recent(&pool, &filter(1)).await.unwrap();
        assert_eq!(rows[0].balance, big);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_integrity_error() {
        let pool = db::memory().await;
        insert(&pool, &record("1", 10, 10, 100, 1_000)).await.unwrap();
        sqlx::query("UPDATE balance_history SET balance = 'lots';")
            .execute(&pool)
            .await
            .unwrap();
        let err = recent(&pool, &filter(1)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AggregateError>(),
            Some(AggregateError::DataIntegrity { field: "balance", .. })
        ));
    }

    #[tokio::test]
    async fn test_balance_at() {
        let pool = db::memory().await;
        insert(&pool, &record("1", 10, 10, 100, 1_000)).await.unwrap();
        insert(&pool, &record("2", 30, 20, 101, 2_000)).await.unwrap();
        let safe: Address = SAFE.parse().unwrap();
        let native = Address::native();

        let at = |t| balance_at(&pool, &safe, &native, "mainnet", t);
        assert_eq!(at(999).await.unwrap(), None);
        assert_eq!(at(1_500).await.unwrap().unwrap().balance, 10);
        assert_eq!(at(2_000).await.unwrap().unwrap().balance, 30);
    }
}
