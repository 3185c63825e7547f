use anyhow::anyhow;
use futures::{future::BoxFuture, FutureExt};
use safewatch_core::{proxy_id, ChainEvent, SafeEvent};

use super::HandlerContext;
use crate::db::{
    self,
    proxy::{ProxyField, Setup},
};

pub(super) fn unexpected(event: &ChainEvent) -> anyhow::Error {
    anyhow!("{} event routed to the wrong handler", event.kind())
}

pub fn proxy_creation<'a>(
    ctx: &'a HandlerContext,
    event: &'a ChainEvent,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        let SafeEvent::ProxyCreation { proxy, singleton } = &event.event else {
            return Err(unexpected(event));
        };

        if event.address != ctx.chain.factory {
            tracing::warn!(
                "Ignoring ProxyCreation for {proxy} emitted by {}, not the proxy factory",
                event.address
            );
            return Ok(());
        }

        let id = proxy_id(&ctx.chain.name, proxy);
        let created = db::proxy::register(
            &ctx.pool,
            &id,
            proxy.as_str(),
            &ctx.chain.name,
            singleton.as_str(),
            event.block_number,
        )
        .await?;

        if created {
            tracing::info!("New Safe proxy {id} at block {}", event.block_number);
        }
        Ok(())
    }
    .boxed()
}

pub fn safe_setup<'a>(
    ctx: &'a HandlerContext,
    event: &'a ChainEvent,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        let SafeEvent::SafeSetup {
            owners,
            threshold,
            initializer,
            fallback_handler,
            ..
        } = &event.event
        else {
            return Err(unexpected(event));
        };

        let id = proxy_id(&ctx.chain.name, &event.address);
        db::proxy::setup(
            &ctx.pool,
            &Setup {
                id: &id,
                address: event.address.as_str(),
                chain: &ctx.chain.name,
                owners: owners.iter().map(ToString::to_string).collect(),
                threshold: *threshold,
                initializer: initializer.as_str(),
                fallback_handler: fallback_handler.as_str(),
                created_at: event.block_timestamp,
                created_block: event.block_number,
            },
        )
        .await?;

        tracing::debug!("Safe {id} set up with {} owners", owners.len());
        Ok(())
    }
    .boxed()
}

pub fn added_owner<'a>(
    ctx: &'a HandlerContext,
    event: &'a ChainEvent,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        let SafeEvent::AddedOwner { owner } = &event.event else {
            return Err(unexpected(event));
        };
        update_owners(ctx, event, |owners| {
            if !owners.iter().any(|o| o == owner.as_str()) {
                owners.push(owner.to_string());
            }
        })
        .await
    }
    .boxed()
}

pub fn removed_owner<'a>(
    ctx: &'a HandlerContext,
    event: &'a ChainEvent,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        let SafeEvent::RemovedOwner { owner } = &event.event else {
            return Err(unexpected(event));
        };
        update_owners(ctx, event, |owners| owners.retain(|o| o != owner.as_str())).await
    }
    .boxed()
}

async fn update_owners(
    ctx: &HandlerContext,
    event: &ChainEvent,
    change: impl FnOnce(&mut Vec<String>),
) -> anyhow::Result<()> {
    let id = proxy_id(&ctx.chain.name, &event.address);
    let mut tx = ctx.pool.begin().await?;

    let Some(proxy) = db::proxy::find(&mut tx, &id).await? else {
        tracing::debug!("{} for unknown Safe {id}", event.kind());
        return Ok(());
    };

    let mut owners = proxy.owners()?;
    change(&mut owners);
    db::proxy::set_owners(&mut tx, &id, &owners).await?;
    tx.commit().await?;
    Ok(())
}

/// Threshold, guard and fallback handler changes.
pub fn changed_field<'a>(
    ctx: &'a HandlerContext,
    event: &'a ChainEvent,
) -> BoxFuture<'a, anyhow::Result<()>> {
    async move {
        let field = match &event.event {
            SafeEvent::ChangedThreshold { threshold } => ProxyField::Threshold(*threshold),
            SafeEvent::ChangedGuard { guard } => ProxyField::Guard(guard.to_string()),
            SafeEvent::ChangedFallbackHandler { handler } => {
                ProxyField::FallbackHandler(handler.to_string())
            }
            _ => return Err(unexpected(event)),
        };

        let id = proxy_id(&ctx.chain.name, &event.address);
        if !db::proxy::update(&ctx.pool, &id, &field).await? {
            tracing::debug!("{} for unknown Safe {id}", event.kind());
        }
        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use safewatch_core::{Address, PROXY_FACTORY_ADDRESS};

    use super::*;
    use crate::handlers::tests::{apply, context, event, OTHER, SAFE};

    fn setup_event() -> ChainEvent {
        event(
            SAFE,
            23_804_500,
            1,
            SafeEvent::SafeSetup {
                initiator: PROXY_FACTORY_ADDRESS.parse().unwrap(),
                owners: vec![OTHER.parse().unwrap()],
                threshold: 1,
                initializer: Address::native(),
                fallback_handler: "0x5555555555555555555555555555555555555555".parse().unwrap(),
            },
        )
    }

    fn creation(emitter: &str) -> ChainEvent {
        event(
            emitter,
            23_804_500,
            0,
            SafeEvent::ProxyCreation {
                proxy: SAFE.parse().unwrap(),
                singleton: "0x41675c099f32341bf84bfc5382af534df5c7461a".parse().unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn test_proxy_creation_from_factory_only() {
        let ctx = context().await;
        let id = format!("mainnet:{SAFE}");

        apply(&ctx, &creation(OTHER)).await.unwrap();
        assert!(!db::proxy::exists(&ctx.pool, &id).await.unwrap());

        apply(&ctx, &creation(PROXY_FACTORY_ADDRESS)).await.unwrap();
        apply(&ctx, &creation(PROXY_FACTORY_ADDRESS)).await.unwrap();
        let proxy = db::proxy::find(&ctx.pool, &id).await.unwrap().unwrap();
        assert_eq!(proxy.created_block, 23_804_500);
    }

    #[tokio::test]
    async fn test_world_chain_prefix() {
        let mut ctx = context().await;
        ctx.chain = crate::config::Chain::new("worldchain");
        apply(&ctx, &creation(PROXY_FACTORY_ADDRESS)).await.unwrap();
        assert!(db::proxy::exists(&ctx.pool, &format!("world:{SAFE}"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_setup_and_owner_changes() {
        let ctx = context().await;
        let id = format!("mainnet:{SAFE}");
        apply(&ctx, &creation(PROXY_FACTORY_ADDRESS)).await.unwrap();
        let setup = setup_event();
        apply(&ctx, &setup).await.unwrap();

        let owner = "0x3333333333333333333333333333333333333333";
        let added = event(
            SAFE,
            23_804_600,
            0,
            SafeEvent::AddedOwner {
                owner: owner.parse().unwrap(),
            },
        );
        apply(&ctx, &added).await.unwrap();
        apply(&ctx, &added).await.unwrap();
        apply(
            &ctx,
            &event(SAFE, 23_804_601, 0, SafeEvent::ChangedThreshold { threshold: 2 }),
        )
        .await
        .unwrap();

        let proxy = db::proxy::find(&ctx.pool, &id).await.unwrap().unwrap();
        assert_eq!(proxy.owners().unwrap(), vec![OTHER, owner]);
        assert_eq!(proxy.threshold, 2);
        assert_eq!(proxy.created_at, Some(setup.block_timestamp));
        assert!(proxy.singleton.is_some());

        apply(
            &ctx,
            &event(SAFE, 23_804_700, 0, SafeEvent::RemovedOwner { owner: OTHER.parse().unwrap() }),
        )
        .await
        .unwrap();
        let proxy = db::proxy::find(&ctx.pool, &id).await.unwrap().unwrap();
        assert_eq!(proxy.owners().unwrap(), vec![owner]);
    }

    #[tokio::test]
    async fn test_owner_change_for_unknown_safe() {
        let ctx = context().await;
        let removed = event(OTHER, 1, 0, SafeEvent::RemovedOwner { owner: SAFE.parse().unwrap() });
        apply(&ctx, &removed).await.unwrap();
        assert_eq!(db::stats::proxy_count(&ctx.pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_handler() {
        let ctx = context().await;
        let err = safe_setup(&ctx, &creation(PROXY_FACTORY_ADDRESS)).await;
        assert!(err.is_err());
    }
}
