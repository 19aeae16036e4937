//! JSON-lines transport over standard input and output
//!
//! Each stdin line is one tagged `BotEvent`; each send is written as one
//! `{"type":"send", ...}` line.

use async_trait::async_trait;
use serde::Serialize;
use sofiya_bot::BotEvent;
use sofiya_core::{GroupMetadata, Result, SofiyaError, Transport};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, Mutex},
};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "send")]
struct OutboundLine<'a> {
    chat_id: &'a str,
    text: &'a str,
    mentions: &'a [String],
}

/// Transport writing sends as JSON lines to `W`
pub struct LineTransport<W> {
    out: Mutex<W>,
}

impl<W> LineTransport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> Transport for LineTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()> {
        let mut line = serde_json::to_vec(&OutboundLine {
            chat_id,
            text,
            mentions,
        })?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line)
            .await
            .map_err(|e| SofiyaError::transport(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| SofiyaError::transport(e.to_string()))
    }

    /// No metadata source on a line stream; the group id stands in for the
    /// subject
    async fn group_metadata(&self, group_id: &str) -> Result<GroupMetadata> {
        Ok(GroupMetadata {
            subject: group_id.to_string(),
            ..GroupMetadata::default()
        })
    }
}

/// Parse event lines from `reader` into `events` until EOF or until the
/// receiver is gone; returns the number of events forwarded
///
/// Blank lines are skipped. Lines that do not decode are logged and skipped.
pub async fn forward_events<R>(reader: R, events: mpsc::Sender<BotEvent>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: BotEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!("⚠️ Skipping undecodable event line: {}", e);
                continue;
            }
        };
        if events.send(event).await.is_err() {
            debug!("Event receiver closed");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}
