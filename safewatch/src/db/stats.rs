use sqlx::SqlitePool;

pub async fn proxy_count(conn: &SqlitePool) -> anyhow::Result<i64> {
    let (count,) = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM safe_proxy;")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn history_count(conn: &SqlitePool) -> anyhow::Result<i64> {
    let (count,) = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM balance_history;")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn balance_count(conn: &SqlitePool) -> anyhow::Result<i64> {
    let (count,) = sqlx::query_as::<_, (i64,)>("SELECT count(*) FROM token_balance;")
        .fetch_one(conn)
        .await?;
    Ok(count)
}
