//! VSS update sources
//!
//! The provider consumes update batches through [`UpdateSource`]. The
//! bundled [`JsonLinesSource`] replays batches from a file or stdin, one JSON
//! array of updates per line:
//!
//! ```text
//! [{"path": "Vehicle.Cabin.Door.Row1.DriverSide.IsOpen", "field": "actuator_target", "value": true}]
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use vss_can_mapper::{EntryUpdate, SubscribeEntry};

/// One batch of updates as delivered by the server
pub type UpdateBatch = Vec<EntryUpdate>;

/// Stream of update batches
pub type UpdateStream = BoxStream<'static, Result<UpdateBatch>>;

/// Something that delivers VSS updates for subscribed paths
#[async_trait]
pub trait UpdateSource: Send {
    /// Subscribe to the given entries and return the stream of batches
    async fn subscribe(&mut self, entries: Vec<SubscribeEntry>) -> Result<UpdateStream>;
}

/// Replays update batches from JSON lines
pub struct JsonLinesSource {
    path: Option<PathBuf>,
}

impl JsonLinesSource {
    /// Read batches from standard input
    pub fn stdin() -> Self {
        Self { path: None }
    }

    /// Read batches from a file
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

type BoxedLines = Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

struct ReplayState {
    lines: Option<BoxedLines>,
    paths: HashSet<String>,
}

#[async_trait]
impl UpdateSource for JsonLinesSource {
    async fn subscribe(&mut self, entries: Vec<SubscribeEntry>) -> Result<UpdateStream> {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = match &self.path {
            Some(path) => {
                log::info!("Reading updates from {:?}", path);
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open updates file: {:?}", path))?;
                Box::new(BufReader::new(file))
            }
            None => {
                log::info!("Reading updates from stdin");
                Box::new(BufReader::new(tokio::io::stdin()))
            }
        };

        let state = ReplayState {
            lines: Some(reader.lines()),
            paths: entries.into_iter().map(|e| e.path).collect(),
        };

        let updates = stream::unfold(state, |mut state| async move {
            let lines = state.lines.as_mut()?;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        let batch = parse_batch(&line, &state.paths);
                        return Some((batch, state));
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        state.lines = None;
                        return Some((Err(anyhow::Error::new(e).context("Failed to read updates")), state));
                    }
                }
            }
        });

        Ok(updates.boxed())
    }
}

/// Parse one line and keep only updates for subscribed paths
fn parse_batch(line: &str, paths: &HashSet<String>) -> Result<UpdateBatch> {
    let mut batch: UpdateBatch = serde_json::from_str(line)
        .with_context(|| format!("Invalid update batch: {}", line))?;
    batch.retain(|update| paths.contains(&update.path));
    Ok(batch)
}
