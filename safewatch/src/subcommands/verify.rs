use anyhow::bail;
use futures::TryStreamExt;
use safewatch_core::BalanceRecord;
use sqlx::SqlitePool;

use crate::db::{self, history::HistoryRow};

/// Counts of balance invariant violations.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Violations {
    /// History rows whose balance is not the previous balance plus their change.
    pub history: usize,
    /// Current balances that differ from their latest history row.
    pub balances: usize,
}

pub(crate) async fn verify(pool: &SqlitePool) -> anyhow::Result<()> {
    let violations = check(pool).await?;
    if violations != Violations::default() {
        bail!(
            "{} balance history rows and {} current balances are inconsistent",
            violations.history,
            violations.balances
        );
    }
    tracing::info!("Balance history verified.");
    Ok(())
}

pub(crate) async fn check(pool: &SqlitePool) -> anyhow::Result<Violations> {
    let mut violations = Violations::default();
    let mut rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT * FROM balance_history ORDER BY chain, safe_address, token_address, block_number, log_index;",
    )
    .fetch(pool);

    let mut previous: Option<BalanceRecord> = None;
    while let Some(row) = rows.try_next().await? {
        let record = BalanceRecord::try_from(row)?;
        let opening = match &previous {
            Some(p)
                if p.chain == record.chain
                    && p.safe_address == record.safe_address
                    && p.token_address == record.token_address =>
            {
                p.balance
            }
            _ => 0,
        };

        if opening.checked_add(record.change) != Some(record.balance) {
            tracing::warn!(
                "History row {} has balance {} after {} from {opening}",
                record.id,
                record.balance,
                record.change
            );
            violations.history += 1;
        }
        previous = Some(record);
    }
    drop(rows);

    for (id, current, latest) in db::balance::mismatches(pool).await? {
        tracing::warn!(
            "Balance {id} is {} but its latest history row says {}",
            current.as_deref().unwrap_or("missing"),
            latest.as_deref().unwrap_or("missing")
        );
        violations.balances += 1;
    }

    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::history::{self, tests::record};

    #[tokio::test]
    async fn test_consistent_history() {
        let pool = db::memory().await;
        history::insert(&pool, &record("1", 10, 10, 100, 1_000)).await.unwrap();
        history::insert(&pool, &record("2", 4, -6, 101, 2_000)).await.unwrap();
        db::balance::rebuild(&pool).await.unwrap();

        assert_eq!(check(&pool).await.unwrap(), Violations::default());
        assert!(verify(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn test_broken_chain_of_balances() {
        let pool = db::memory().await;
        history::insert(&pool, &record("1", 10, 10, 100, 1_000)).await.unwrap();
        history::insert(&pool, &record("2", 5, -6, 101, 2_000)).await.unwrap();

        let violations = check(&pool).await.unwrap();
        assert_eq!(
            violations,
            Violations {
                history: 1,
                balances: 1,
            }
        );
        assert!(verify(&pool).await.is_err());
    }
}
