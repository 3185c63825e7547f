use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// Location of config file: Default: safewatch.toml
    #[arg(short, long, default_value = "safewatch.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Subcommand {
    /// Output example config file.
    Init,

    /// Read every configured chain feed and index new events.
    Index,

    /// Start the HTTP query API, with the indexer running in the background.
    Server,

    /// Rebuild current token balances from the balance history. This operation is fast, it does NOT replay any feed.
    Reindex,

    /// Forget everything indexed at or above an optional blockheight, so the next index replays the feeds from there.
    Rescan { blockheight: Option<i64> },

    /// Check that every balance history row follows from the previous one.
    Verify,

    /// Prints the current version of application
    Version,
}
