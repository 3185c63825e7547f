use std::collections::HashMap;

use futures::future::BoxFuture;
use safewatch_core::{ChainEvent, EventKind};
use sqlx::SqlitePool;

use crate::config::Chain;

mod proxy;
mod transfer;

/// What a handler needs to apply one event.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub pool: SqlitePool,
    pub chain: Chain,
}

pub type Handler =
    for<'a> fn(&'a HandlerContext, &'a ChainEvent) -> BoxFuture<'a, anyhow::Result<()>>;

/// Lookup table from event kind to the function that applies it.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<EventKind, Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, handler: Handler) -> &mut Self {
        if self.handlers.insert(kind, handler).is_some() {
            tracing::warn!("Replacing handler for {kind}");
        }
        self
    }

    #[cfg(test)]
    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Future applying `event`, or `None` when no handler is registered for its kind.
    pub fn dispatch<'a>(
        &self,
        ctx: &'a HandlerContext,
        event: &'a ChainEvent,
    ) -> Option<BoxFuture<'a, anyhow::Result<()>>> {
        self.handlers
            .get(&event.kind())
            .map(|handler| handler(ctx, event))
    }
}

/// Registry with every Safe event handler.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .on(EventKind::ProxyCreation, proxy::proxy_creation)
        .on(EventKind::SafeSetup, proxy::safe_setup)
        .on(EventKind::AddedOwner, proxy::added_owner)
        .on(EventKind::RemovedOwner, proxy::removed_owner)
        .on(EventKind::ChangedThreshold, proxy::changed_field)
        .on(EventKind::ChangedGuard, proxy::changed_field)
        .on(EventKind::ChangedFallbackHandler, proxy::changed_field)
        .on(EventKind::ExecutionSuccess, transfer::execution_success)
        .on(EventKind::NativeTransferIn, transfer::native_transfer)
        .on(EventKind::NativeTransferOut, transfer::native_transfer);
    registry
}
