use anyhow::anyhow;
use futures::{future::BoxFuture, FutureExt};
use safewatch_core::{
    balance_id, history_id, proxy_id, Address, BalanceRecord, ChainEvent, SafeEvent,
};

use super::{proxy::unexpected, HandlerContext};
use crate::db;

/// Native currency moving in or out of a Safe.
///
/// Appends one history row and moves the current balance to the row's balance, both in
/// one transaction. A redelivered event finds its history row already present and
/// changes nothing.
pub fn native_transfer<'a>(
    ctx: &'a HandlerContext,
    event: &'a ChainEvent,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        let (safe, value, sign) = match &event.event {
            SafeEvent::NativeTransferIn { to, value, .. } => (to, value, 1),
            SafeEvent::NativeTransferOut { from, value, .. } => (from, value, -1),
            _ => return Err(unexpected(event)),
        };

        if !db::proxy::exists(&ctx.pool, &proxy_id(&ctx.chain.name, safe)).await? {
            tracing::debug!("Ignoring transfer for {safe}, not a known Safe");
            return Ok(());
        }

        let change = i128::try_from(*value)
            .map_err(|_| anyhow!("transfer value {value} out of range"))?
            * sign;
        apply_change(ctx, event, safe, &Address::native(), change).await
    }
    .boxed()
}

async fn apply_change(
    ctx: &HandlerContext,
    event: &ChainEvent,
    safe: &Address,
    token: &Address,
    change: i128,
) -> anyhow::Result<()> {
    let chain = ctx.chain.name.as_str();
    let id = balance_id(chain, safe, token);
    let mut tx = ctx.pool.begin().await?;

    let current = db::balance::current(&mut tx, &id).await?.unwrap_or_default();
    let balance = current
        .checked_add(change)
        .ok_or_else(|| anyhow!("balance of {id} overflows applying {change}"))?;

    let record = BalanceRecord {
        id: history_id(chain, &event.transaction_hash, event.log_index),
        safe_address: safe.to_string(),
        token_address: token.to_string(),
        chain: chain.into(),
        balance,
        change,
        block_number: event.block_number,
        block_timestamp: event.block_timestamp,
        transaction_hash: event.transaction_hash.to_string(),
        log_index: event.log_index,
    };

    if !db::history::insert(&mut tx, &record).await? {
        tracing::debug!("Transfer {} already recorded", record.id);
        return Ok(());
    }

    db::balance::upsert(&mut tx, &id, &record).await?;
    tx.commit().await?;

    tracing::debug!("Balance of {id} is now {balance} ({change:+})");
    Ok(())
}

pub fn execution_success<'a>(
    ctx: &'a HandlerContext,
    event: &'a ChainEvent,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        let SafeEvent::ExecutionSuccess { tx_hash, payment } = &event.event else {
            return Err(unexpected(event));
        };
        tracing::debug!(
            "Safe transaction {tx_hash} executed by {} on {} (payment {payment})",
            event.address,
            ctx.chain.name
        );
        Ok(())
    }
    .boxed()
}
