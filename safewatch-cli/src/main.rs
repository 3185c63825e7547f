mod history;
mod render;

use std::path::PathBuf;

use clap::Parser;
use safewatch_core::{
    aggregate, parse_records, project, Address, ChartPoint, Granularity, DEFAULT_DECIMALS,
    MAX_DECIMALS,
};

use history::HistoryRequest;

pub fn main() -> anyhow::Result<()> {
    let ops = Ops::parse();

    handle_ops(ops)?;

    Ok(())
}

fn handle_ops(ops: Ops) -> anyhow::Result<()> {
    match ops.command {
        Commands::Chart {
            server,
            safe,
            token,
            chain,
            limit,
            view,
        } => {
            let request = HistoryRequest {
                server: &server,
                safe: &safe,
                token: token.as_ref(),
                chain: &chain,
                limit,
            };
            let raw = history::fetch(&request)?;
            cmd_chart(raw, &view)?;
        }
        Commands::Aggregate { input, view } => cmd_chart(history::load(&input)?, &view)?,
    }

    Ok(())
}

fn cmd_chart(raw: Vec<safewatch_core::RawBalanceRecord>, view: &View) -> anyhow::Result<()> {
    let points = chart_points(raw, view)?;
    if view.json {
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else if points.is_empty() {
        println!("No balance history.");
    } else {
        print!("{}", render::table(&points));
    }
    Ok(())
}

fn chart_points(
    raw: Vec<safewatch_core::RawBalanceRecord>,
    view: &View,
) -> Result<Vec<ChartPoint>, safewatch_core::AggregateError> {
    let records = parse_records(raw)?;
    let aggregated = aggregate(&records, view.granularity)?;
    project(&aggregated, view.granularity, view.decimals)
}

#[derive(clap::Parser)]
struct Ops {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct View {
    /// Bucket width: raw, hour, day, week or month.
    #[arg(short, long, default_value_t = Granularity::Day)]
    granularity: Granularity,

    /// Fixed-point decimals of the token.
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_DECIMALS,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_DECIMALS))
    )]
    decimals: u32,

    /// Print chart points as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Chart the balance history of a Safe served by a running indexer.
    Chart {
        /// Base URL of the indexer API.
        #[arg(short, long, default_value = "http://localhost:42069")]
        server: String,

        /// Safe address.
        safe: Address,

        /// Token address, all tokens when omitted.
        #[arg(short, long)]
        token: Option<Address>,

        #[arg(short, long, default_value = "mainnet")]
        chain: String,

        /// Most recent history rows to fetch.
        #[arg(short, long)]
        limit: Option<u32>,

        #[command(flatten)]
        view: View,
    },

    /// Chart balance history rows read from a JSON file.
    Aggregate {
        /// JSON array of history rows, or a saved history API response.
        input: PathBuf,

        #[command(flatten)]
        view: View,
    },
}
