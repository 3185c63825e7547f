use std::path::PathBuf;

use safewatch_core::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub api: Option<bool>,
    pub indexer: Option<bool>,
    pub indexer_delay: Option<u64>,
    pub default_limit: Option<u32>,
    pub max_limit: Option<u32>,
}
impl ServerConfig {
    fn example() -> ServerConfig {
        ServerConfig {
            bind: Some("0.0.0.0:42069".into()),
            api: Some(true),
            indexer: Some(true),
            indexer_delay: Some(30),
            default_limit: Some(1000),
            max_limit: Some(10000),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ChainConfig {
    pub name: String,
    pub id: Option<u64>,
    pub feed: Option<PathBuf>,
    pub start_block: Option<u64>,
    pub factory: Option<Address>,
}
impl ChainConfig {
    fn example(name: &str, id: u64, start_block: u64) -> ChainConfig {
        ChainConfig {
            name: name.into(),
            id: Some(id),
            feed: Some(format!("feeds/{name}.jsonl").into()),
            start_block: Some(start_block),
            factory: Some(Address::proxy_factory()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ConfigFile {
    pub data: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

impl ConfigFile {
    pub fn example() -> ConfigFile {
        ConfigFile {
            data: Some("safewatch.db".into()),
            server: ServerConfig::example(),
            chains: vec![
                ChainConfig::example("mainnet", 1, 23_804_491),
                ChainConfig::example("worldchain", 480, 21_900_000),
            ],
        }
    }
}
