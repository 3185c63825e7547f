use crate::{config::Config, db, handlers};

mod feed;

use feed::{index_chain, JsonLinesSource};

pub async fn index(config: &Config) -> anyhow::Result<()> {
    let pool = config.sqlite().await?;
    let registry = handlers::registry();

    for chain in config.chains() {
        if !chain.feed.is_file() {
            tracing::warn!("No event feed for {} at {:?}", chain.name, chain.feed);
            continue;
        }

        tracing::info!("Indexing {} from {:?}", chain.name, chain.feed);
        let source = JsonLinesSource::open(&chain.feed)?;
        let summary = index_chain(&pool, &chain, source, &registry).await?;
        tracing::info!(
            "Indexed {}: {} applied, {} skipped",
            chain.name,
            summary.applied,
            summary.skipped
        );
    }

    db::event_log::save(&pool, "index", "").await?;
    tracing::info!("Index complete.");
    Ok(())
}
