use std::path::PathBuf;

use safewatch_core::Address;
use sqlx::{sqlite, SqlitePool};

use super::{ChainConfig, Cli, ConfigFile};

#[derive(Clone, Debug)]
pub struct Config {
    pub cli: Cli,
    pub file: ConfigFile,
}

/// A configured chain with all defaults applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    pub name: String,
    pub feed: PathBuf,
    pub start_block: u64,
    pub factory: Address,
}

impl Chain {
    pub fn new(name: &str) -> Chain {
        Chain::from(&ChainConfig {
            name: name.into(),
            ..Default::default()
        })
    }
}

impl From<&ChainConfig> for Chain {
    fn from(value: &ChainConfig) -> Self {
        Chain {
            name: value.name.clone(),
            feed: value
                .feed
                .clone()
                .unwrap_or_else(|| format!("feeds/{}.jsonl", value.name).into()),
            start_block: value
                .start_block
                .unwrap_or_else(|| default_start_block(&value.name)),
            factory: value.factory.clone().unwrap_or_else(Address::proxy_factory),
        }
    }
}

fn default_start_block(chain: &str) -> u64 {
    match chain {
        "mainnet" => 23_804_491,
        "worldchain" => 21_900_000,
        _ => 0,
    }
}

impl Config {
    pub fn new(cli: Cli, file: ConfigFile) -> Self {
        Self { cli, file }
    }

    pub async fn sqlite(&self) -> anyhow::Result<sqlite::SqlitePool> {
        let db = self.data();

        // SQLx doesn't seem to like it if a db file does not already exist, so let's create an empty one
        if !tokio::fs::try_exists(&db).await? {
            tokio::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .open(&db)
                .await?;
        }

        Ok(SqlitePool::connect(&format!("sqlite:{}", db.to_string_lossy())).await?)
    }

    pub fn chains(&self) -> Vec<Chain> {
        self.file.chains.iter().map(Chain::from).collect()
    }

    fn data(&self) -> PathBuf {
        self.file.data.clone().unwrap_or_else(|| "safewatch.db".into())
    }

    pub fn server_bind(&self) -> Option<String> {
        self.file.server.bind.clone()
    }

    pub fn server_indexer_delay(&self) -> u64 {
        self.file.server.indexer_delay.unwrap_or(30)
    }

    pub fn indexer(&self) -> bool {
        self.file.server.indexer.unwrap_or(true)
    }

    pub fn api(&self) -> bool {
        self.file.server.api.unwrap_or(true)
    }

    pub fn default_limit(&self) -> u32 {
        self.file.server.default_limit.unwrap_or(1000)
    }

    pub fn max_limit(&self) -> u32 {
        self.file.server.max_limit.unwrap_or(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_defaults() {
        let chain = Chain::new("worldchain");
        assert_eq!(chain.start_block, 21_900_000);
        assert_eq!(chain.feed, PathBuf::from("feeds/worldchain.jsonl"));
        assert_eq!(chain.factory, Address::proxy_factory());

        let chain = Chain::from(&ChainConfig {
            name: "base".into(),
            start_block: Some(5),
            ..Default::default()
        });
        assert_eq!(chain.start_block, 5);
    }
}
