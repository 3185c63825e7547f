use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::Context;
use safewatch_core::{ChainEvent, EventError};
use sqlx::SqlitePool;

use crate::{
    config::Chain,
    db,
    handlers::{HandlerContext, Registry},
};

/// A source of decoded events for one chain, in chain order.
pub trait EventSource: Send + 'static {
    /// The next event, `Some(Err(_))` for an undecodable item, `None` when drained.
    fn next_event(&mut self) -> Option<Result<ChainEvent, EventError>>;
}

impl<I> EventSource for I
where
    I: Iterator<Item = Result<ChainEvent, EventError>> + Send + 'static,
{
    fn next_event(&mut self) -> Option<Result<ChainEvent, EventError>> {
        self.next()
    }
}

/// Newline delimited JSON events. Blank lines are skipped.
///
/// The source ends after the first read error.
pub struct JsonLinesSource<R> {
    lines: std::io::Lines<R>,
    failed: bool,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            failed: false,
        }
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening feed {path:?}"))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<ChainEvent, EventError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            if !line.trim().is_empty() {
                return Some(ChainEvent::from_json(&line));
            }
        }
    }
}

enum QueueMessage {
    Event(ChainEvent),
    Malformed { item: usize, error: EventError },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexSummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Runs every event of `source` through `registry`, resuming after the chain's cursor.
///
/// An item that cannot be decoded or applied ends the pass with an error. The cursor stays
/// at the last applied event, so the next pass retries from there.
pub async fn index_chain(
    pool: &SqlitePool,
    chain: &Chain,
    source: impl EventSource,
    registry: &Registry,
) -> anyhow::Result<IndexSummary> {
    let (sender, receiver) = tokio::sync::mpsc::channel(1);
    let ctx = HandlerContext {
        pool: pool.clone(),
        chain: chain.clone(),
    };

    // Decoding runs on a blocking thread, handlers run here.
    let thread = spawn_feed_thread(source, sender, chain.name.clone());
    let result = process_messages(receiver, &ctx, registry).await;
    thread.await?;

    result
}

fn spawn_feed_thread(
    mut source: impl EventSource,
    sender: tokio::sync::mpsc::Sender<QueueMessage>,
    chain: String,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut item = 0;
        while let Some(next) = source.next_event() {
            // If the channel is closed, let's stop
            if sender.is_closed() {
                tracing::info!("Stopping {chain} feed.");
                break;
            }

            item += 1;
            let msg = match next {
                Ok(event) => QueueMessage::Event(event),
                Err(error) => QueueMessage::Malformed { item, error },
            };
            if sender.blocking_send(msg).is_err() {
                break;
            }
        }
    })
}

async fn process_messages(
    mut receiver: tokio::sync::mpsc::Receiver<QueueMessage>,
    ctx: &HandlerContext,
    registry: &Registry,
) -> anyhow::Result<IndexSummary> {
    let guard = elegant_departure::get_shutdown_guard();
    let mut cursor = db::cursor::get(&ctx.pool, &ctx.chain.name).await?;
    let mut summary = IndexSummary::default();

    'select: loop {
        tokio::select! {
            msg = receiver.recv() => {
                match msg {
                    Some(QueueMessage::Event(event)) => {
                        let result = apply(ctx, registry, &event, &mut cursor, &mut summary).await;
                        if let Err(e) = result {
                            receiver.close();
                            return Err(e);
                        }
                    }
                    Some(QueueMessage::Malformed { item, error }) => {
                        receiver.close();
                        return Err(anyhow::Error::new(error).context(format!(
                            "{} feed item {item} could not be decoded, cursor at {cursor:?}",
                            ctx.chain.name
                        )));
                    }
                    None => break 'select,
                }
            }
            _ = guard.wait() => {
                receiver.close();
                break 'select;
            }
        }
    }

    Ok(summary)
}

async fn apply(
    ctx: &HandlerContext,
    registry: &Registry,
    event: &ChainEvent,
    cursor: &mut Option<(u64, u64)>,
    summary: &mut IndexSummary,
) -> anyhow::Result<()> {
    if event.block_number < ctx.chain.start_block {
        summary.skipped += 1;
        return Ok(());
    }

    if let Some(previous) = *cursor {
        if let Err(e) = event.check_follows(previous) {
            tracing::debug!("Skipping {e}");
            summary.skipped += 1;
            return Ok(());
        }
    }

    match registry.dispatch(ctx, event) {
        Some(handler) => handler.await.with_context(|| {
            format!(
                "{} handler failed on {} at block {} log {}",
                event.kind(),
                ctx.chain.name,
                event.block_number,
                event.log_index
            )
        })?,
        None => tracing::debug!("No handler for {} events", event.kind()),
    }

    db::cursor::advance(&ctx.pool, &ctx.chain.name, event.position()).await?;
    *cursor = Some(event.position());
    summary.applied += 1;

    if event.block_number % 1000 == 0 && event.log_index == 0 {
        tracing::info!("Index {} block height {}", ctx.chain.name, event.block_number);
    }
    Ok(())
}
