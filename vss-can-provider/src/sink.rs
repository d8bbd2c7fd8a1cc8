//! CAN frame sinks
//!
//! [`CandumpSink`] writes frames in the candump log format
//! (`(1697612345.123456) vcan0 102#0100000000000000`), which can be replayed
//! onto a real interface with `canplayer`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use vss_can_mapper::CanFrame;

/// Something that puts CAN frames on a bus
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: &CanFrame) -> Result<()>;
}

/// Writes frames as candump log lines
pub struct CandumpSink {
    interface: String,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl CandumpSink {
    pub fn new(interface: impl Into<String>, writer: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            interface: interface.into(),
            writer,
        }
    }

    /// Write frames to standard output
    pub fn stdout(interface: impl Into<String>) -> Self {
        Self::new(interface, Box::new(tokio::io::stdout()))
    }

    /// Write frames to a file, truncating it
    pub async fn create(path: &Path, interface: impl Into<String>) -> Result<Self> {
        let file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create frame log: {:?}", path))?;
        Ok(Self::new(interface, Box::new(file)))
    }
}

#[async_trait]
impl FrameSink for CandumpSink {
    async fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let line = format_frame(frame, &self.interface, Utc::now());
        self.writer
            .write_all(line.as_bytes())
            .await
            .context("Failed to write frame")?;
        self.writer.flush().await.context("Failed to flush frame log")?;
        log::debug!("Message sent on {}: {}", self.interface, line.trim_end());
        Ok(())
    }
}

/// Format one frame as a candump log line
pub fn format_frame(frame: &CanFrame, interface: &str, timestamp: DateTime<Utc>) -> String {
    let id = if frame.is_extended {
        format!("{:08X}", frame.id)
    } else {
        format!("{:03X}", frame.id)
    };
    let data: String = frame.data.iter().map(|b| format!("{:02X}", b)).collect();
    format!(
        "({}.{:06}) {} {}#{}\n",
        timestamp.timestamp(),
        timestamp.timestamp_subsec_micros(),
        interface,
        id,
        data
    )
}
