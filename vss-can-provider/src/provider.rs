//! Provider loop
//!
//! Subscribes to every mapped VSS path, applies each received batch of
//! target values to the mapping table and sends the touched CAN frames.

use crate::sink::FrameSink;
use crate::source::{UpdateBatch, UpdateSource};
use anyhow::Result;
use futures::StreamExt;
use tokio::sync::watch;
use vss_can_mapper::{CanFrame, Field, FrameCodec, FrameDefaults, MappingTable, SignalValue};

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Batches processed
    pub batches: usize,
    /// Batches the source failed to deliver
    pub failed_batches: usize,
    /// Frames handed to the sink successfully
    pub frames_sent: usize,
}

pub struct Provider {
    codec: FrameCodec,
    table: MappingTable,
    defaults: FrameDefaults,
}

impl Provider {
    pub fn new(codec: FrameCodec, table: MappingTable, defaults: FrameDefaults) -> Self {
        Self {
            codec,
            table,
            defaults,
        }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Run until the update stream ends or shutdown is requested
    ///
    /// Shutdown is only observed between batches; a batch that has been
    /// received is always processed and its frames sent.
    pub async fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RunStats>
    where
        S: UpdateSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let mut updates = source.subscribe(self.table.subscribe_entries()).await?;
        let mut stats = RunStats::default();
        let mut shutdown_closed = false;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                biased;
                changed = shutdown.changed(), if !shutdown_closed => {
                    if changed.is_err() {
                        shutdown_closed = true;
                    }
                    continue;
                }
                next = updates.next() => next,
            };

            match next {
                Some(Ok(batch)) => {
                    log::debug!("Received update of length {}", batch.len());
                    stats.batches += 1;
                    stats.frames_sent += self.handle_batch(batch, sink).await;
                }
                Some(Err(e)) => {
                    log::error!("Failed to receive updates: {:#}", e);
                    stats.failed_batches += 1;
                }
                None => {
                    log::info!("Update stream ended");
                    break;
                }
            }
        }

        log::info!("Shutting down...");
        Ok(stats)
    }

    /// Apply one batch and send every touched frame; returns frames sent
    pub async fn handle_batch<K>(&mut self, batch: UpdateBatch, sink: &mut K) -> usize
    where
        K: FrameSink + ?Sized,
    {
        let mut targets: Vec<(&str, &SignalValue)> = Vec::new();
        for update in &batch {
            match (update.field, &update.value) {
                (Field::Value, Some(value)) => {
                    // Never subscribed; only target values drive the bus
                    log::warn!(
                        "Current value for {} is now: {} of type {}",
                        update.path,
                        value,
                        value.type_name()
                    );
                }
                (Field::ActuatorTarget, Some(value)) => {
                    log::info!(
                        "Target value for {} is now: {} of type {}",
                        update.path,
                        value,
                        value.type_name()
                    );
                    targets.push((update.path.as_str(), value));
                }
                (field, None) => {
                    log::debug!("No {} in update for {}", field, update.path);
                }
            }
        }

        let touched = self.table.apply_updates(targets);

        let mut sent = 0;
        for frame_id in touched {
            if !self.defaults.supports(frame_id) {
                log::info!("No default values for CAN id {}, frame not sent", frame_id);
                continue;
            }

            let frame = match self.build_frame(frame_id) {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("Failed to build CAN frame {}: {:#}", frame_id, e);
                    continue;
                }
            };

            match sink.send(&frame).await {
                Ok(()) => sent += 1,
                Err(e) => log::error!("Failed to send CAN frame {}: {:#}", frame_id, e),
            }
        }
        sent
    }

    fn build_frame(&self, frame_id: u32) -> Result<CanFrame> {
        let values = self.table.frame_values(frame_id, &self.defaults)?;
        let data = self.codec.encode(frame_id, &values)?;
        Ok(CanFrame {
            id: frame_id,
            data,
            is_extended: self.codec.is_extended(frame_id),
        })
    }
}
