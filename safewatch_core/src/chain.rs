use crate::{Address, TxHash};

/// Chains whose database id prefix differs from their configured name.
static CHAIN_PREFIXES: [(&str, &str); 2] = [("mainnet", "mainnet"), ("worldchain", "world")];

/// Prefix used in proxy ids for `chain`, falling back to the chain name itself.
pub fn chain_prefix(chain: &str) -> &str {
    CHAIN_PREFIXES
        .iter()
        .find(|(name, _)| *name == chain)
        .map_or(chain, |(_, prefix)| *prefix)
}

/// Id of a Safe proxy row: `{prefix}:{address}`.
pub fn proxy_id(chain: &str, address: &Address) -> String {
    format!("{}:{address}", chain_prefix(chain))
}

/// Id of a current balance row: `{chain}:{safe}:{token}`.
pub fn balance_id(chain: &str, safe: &Address, token: &Address) -> String {
    format!("{chain}:{safe}:{token}")
}

/// Id of a balance history row: `{chain}:{txHash}:{logIndex}`.
pub fn history_id(chain: &str, transaction_hash: &TxHash, log_index: u64) -> String {
    format!("{chain}:{transaction_hash}:{log_index}")
}
