use safewatch_core::{Address, AggregateError, BalanceRecord};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};

#[derive(FromRow, Debug, Clone)]
pub struct TokenBalanceRow {
    pub id: String,
    pub safe_address: String,
    pub token_address: String,
    pub chain: String,
    pub balance: String,
    pub updated_at: i64,
}

impl TokenBalanceRow {
    pub fn amount(&self) -> Result<i128, AggregateError> {
        self.balance
            .parse()
            .map_err(|_| AggregateError::integrity(&self.id, "balance", &self.balance))
    }
}

/// Current balance stored under `id`, if any.
pub async fn current(
    conn: impl Executor<'_, Database = Sqlite>,
    id: &str,
) -> anyhow::Result<Option<i128>> {
    let row = sqlx::query_as::<_, TokenBalanceRow>("SELECT * FROM token_balance WHERE id = ?;")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(|r| r.amount()).transpose()?)
}

/// Sets the current balance to the one carried by the history row `record`.
pub async fn upsert(
    conn: impl Executor<'_, Database = Sqlite>,
    id: &str,
    record: &BalanceRecord,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO token_balance (id, safe_address, token_address, chain, balance, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET balance = excluded.balance, updated_at = excluded.updated_at;",
    )
    .bind(id)
    .bind(&record.safe_address)
    .bind(&record.token_address)
    .bind(&record.chain)
    .bind(record.balance.to_string())
    .bind(record.block_timestamp)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find(
    conn: &SqlitePool,
    safe_address: &Address,
    token_address: &Address,
    chain: &str,
) -> anyhow::Result<Option<TokenBalanceRow>> {
    Ok(sqlx::query_as::<_, TokenBalanceRow>(
        "SELECT * FROM token_balance WHERE safe_address = ? AND token_address = ? AND chain = ?;",
    )
    .bind(safe_address.as_str())
    .bind(token_address.as_str())
    .bind(chain)
    .fetch_optional(conn)
    .await?)
}

/// Replaces every current balance with the latest history row of its account.
pub async fn rebuild(conn: &SqlitePool) -> anyhow::Result<u64> {
    let mut tx = conn.begin().await?;
    sqlx::query("DELETE FROM token_balance;")
        .execute(&mut tx)
        .await?;
    let result = sqlx::query(
        "INSERT INTO token_balance (id, safe_address, token_address, chain, balance, updated_at)
        SELECT chain || ':' || safe_address || ':' || token_address, safe_address, token_address, chain, balance, block_timestamp
        FROM latest_history_vw;",
    )
    .execute(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result.rows_affected())
}

/// Current balances that disagree with the latest history row of their account.
pub async fn mismatches(
    conn: &SqlitePool,
) -> anyhow::Result<Vec<(String, Option<String>, Option<String>)>> {
    Ok(sqlx::query_as::<_, (String, Option<String>, Option<String>)>(
        "SELECT tb.id, tb.balance, h.balance
        FROM token_balance tb
        LEFT JOIN latest_history_vw h
            ON h.chain = tb.chain AND h.safe_address = tb.safe_address AND h.token_address = tb.token_address
        WHERE h.balance IS NULL OR h.balance <> tb.balance
        UNION ALL
        SELECT h.chain || ':' || h.safe_address || ':' || h.token_address, NULL, h.balance
        FROM latest_history_vw h
        LEFT JOIN token_balance tb
            ON h.chain = tb.chain AND h.safe_address = tb.safe_address AND h.token_address = tb.token_address
        WHERE tb.id IS NULL;",
    )
    .fetch_all(conn)
    .await?)
}
