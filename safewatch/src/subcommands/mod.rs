mod index;
mod server;
mod verify;

pub use index::*;
pub use server::*;
pub use verify::*;
use sqlx::SqlitePool;

use crate::{config::ConfigFile, db};

pub(crate) fn init() -> anyhow::Result<()> {
    let config_file = ConfigFile::example();
    let cfg = toml::to_string(&config_file)?;
    println!("{cfg} ");
    Ok(())
}

pub(crate) async fn reindex(pool: &SqlitePool) -> anyhow::Result<()> {
    tracing::info!("Rebuilding token balances from balance history.");
    let balances = db::balance::rebuild(pool).await?;
    tracing::info!("Rebuilt {balances} token balances.");
    Ok(())
}

pub(crate) async fn rescan(pool: &SqlitePool, blockheight: i64) -> anyhow::Result<()> {
    tracing::info!("Re-scanning feeds from blockheight {blockheight}.");
    let history = db::history::delete_from(pool, blockheight).await?;
    let proxies = db::proxy::delete_from(pool, blockheight).await?;
    tracing::info!("Deleted {history} balance history rows and {proxies} Safe proxies.");

    db::balance::rebuild(pool).await?;
    db::cursor::rewind(pool, blockheight).await?;
    db::event_log::save(pool, "rescan", &blockheight.to_string()).await?;
    Ok(())
}

pub(crate) fn version() {
    let version = env!("CARGO_PKG_VERSION");
    let build_date = env!("VERGEN_BUILD_TIMESTAMP");
    println!("Current version is {version} (built {build_date})");
}

#[cfg(test)]
mod tests {
    use safewatch_core::{Address, SafeEvent, PROXY_FACTORY_ADDRESS};

    use super::*;
    use crate::handlers::tests::{apply, context, event, OTHER, SAFE};

    #[tokio::test]
    async fn test_rescan_forgets_later_blocks() {
        let ctx = context().await;
        let creation = event(
            PROXY_FACTORY_ADDRESS,
            100,
            0,
            SafeEvent::ProxyCreation {
                proxy: SAFE.parse().unwrap(),
                singleton: OTHER.parse().unwrap(),
            },
        );
        apply(&ctx, &creation).await.unwrap();
        for block in [101, 102, 103] {
            let transfer = event(
                SAFE,
                block,
                0,
                SafeEvent::NativeTransferIn {
                    from: OTHER.parse().unwrap(),
                    to: SAFE.parse().unwrap(),
                    value: 10,
                },
            );
            apply(&ctx, &transfer).await.unwrap();
        }
        db::cursor::advance(&ctx.pool, "mainnet", (103, 0))
            .await
            .unwrap();

        rescan(&ctx.pool, 102).await.unwrap();

        let id = format!("mainnet:{SAFE}:{}", Address::native());
        assert_eq!(db::balance::current(&ctx.pool, &id).await.unwrap(), Some(10));
        assert_eq!(db::stats::history_count(&ctx.pool).await.unwrap(), 1);
        assert_eq!(db::stats::proxy_count(&ctx.pool).await.unwrap(), 1);
        assert_eq!(
            db::cursor::get(&ctx.pool, "mainnet").await.unwrap(),
            Some((101, i64::MAX as u64))
        );

        rescan(&ctx.pool, 0).await.unwrap();
        assert_eq!(db::stats::proxy_count(&ctx.pool).await.unwrap(), 0);
        assert_eq!(db::stats::balance_count(&ctx.pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reindex_repairs_balances() {
        let ctx = context().await;
        let creation = event(
            PROXY_FACTORY_ADDRESS,
            100,
            0,
            SafeEvent::ProxyCreation {
                proxy: SAFE.parse().unwrap(),
                singleton: OTHER.parse().unwrap(),
            },
        );
        apply(&ctx, &creation).await.unwrap();
        let transfer = event(
            SAFE,
            101,
            0,
            SafeEvent::NativeTransferIn {
                from: OTHER.parse().unwrap(),
                to: SAFE.parse().unwrap(),
                value: 10,
            },
        );
        apply(&ctx, &transfer).await.unwrap();
        sqlx::query("UPDATE token_balance SET balance = '999';")
            .execute(&ctx.pool)
            .await
            .unwrap();

        reindex(&ctx.pool).await.unwrap();
        let id = format!("mainnet:{SAFE}:{}", Address::native());
        assert_eq!(db::balance::current(&ctx.pool, &id).await.unwrap(), Some(10));
    }
}
