//! Stdin/stdout JSON bridge for a realtime session.
//!
//! Reads newline-delimited JSON realtime events from stdin, feeds them to a
//! session, and writes every outbound event as a JSON line to stdout.
//!
//! Stdout is exclusively reserved for the protocol; all diagnostic output
//! (tracing, logs) must be routed to stderr.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::executor::ToolExecutor;
use crate::realtime::{InboundEvent, OutboundEvent};
use crate::session::{SessionHandle, session_channel};
use crate::tools::ToolRegistry;

/// Run the bridge on the process's stdin and stdout until stdin closes.
///
/// # Errors
///
/// Returns [`BridgeError::Channel`] if stdin cannot be read or stdout
/// cannot be written.
pub async fn run_stdio_bridge(
    config: &BridgeConfig,
    tools: Arc<ToolRegistry>,
    executor: Arc<dyn ToolExecutor>,
) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    run_bridge(reader, writer, config, tools, executor).await
}

/// Run the bridge over an arbitrary line reader and writer.
///
/// The transport counts as ready as soon as the bridge starts: the session
/// is started and tools are registered immediately. End of input is queued
/// behind the events read before it, so every one of them is processed and
/// calls in flight get their output and resume before the session closes.
/// A read failure is reported to the session as a transport failure. Lines
/// that are not JSON events are logged and skipped.
///
/// # Errors
///
/// Returns the first read or write failure.
pub async fn run_bridge<R, W>(
    reader: R,
    writer: W,
    config: &BridgeConfig,
    tools: Arc<ToolRegistry>,
    executor: Arc<dyn ToolExecutor>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (handle, controller, outbound_rx) = session_channel(config, tools, executor);
    let session_task = tokio::spawn(controller.run());
    let writer_task = tokio::spawn(forward_outbound(outbound_rx, writer));

    handle.start().await?;
    handle.transport_ready().await?;

    let read_result = read_events(reader, &handle).await;
    let _ = match &read_result {
        Ok(()) => handle.end_input().await,
        Err(e) => handle.transport_failed(e.message()).await,
    };

    // Dropping the last handle ends the session loop, which closes the
    // outbound channel and lets the writer drain.
    drop(handle);
    let _ = session_task.await;
    let write_result = writer_task
        .await
        .map_err(|e| BridgeError::Channel(format!("outbound writer task failed: {e}")))?;

    read_result.and(write_result)
}

/// Read events line by line and deliver them to the session.
async fn read_events<R>(mut reader: R, handle: &SessionHandle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| BridgeError::Channel(format!("failed to read from stdin: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("stdin closed (EOF); draining session");
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event = match InboundEvent::from_json(trimmed) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "skipping malformed inbound line");
                continue;
            }
        };
        handle.deliver(event).await?;
    }
}

/// Write outbound events as JSON lines until the session closes the
/// channel.
async fn forward_outbound<W>(mut rx: mpsc::UnboundedReceiver<OutboundEvent>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, kind = event.kind(), "failed to serialize outbound event; skipping");
                continue;
            }
        };
        if let Err(e) = write_line(&mut writer, &json).await {
            tracing::warn!(error = %e, "failed to write outbound event; stopping writer");
            return Err(e);
        }
    }
    Ok(())
}

/// Write a single JSON line and flush.
async fn write_line<W>(writer: &mut W, json: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| BridgeError::Channel(format!("failed to write to stdout: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| BridgeError::Channel(format!("failed to write newline to stdout: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| BridgeError::Channel(format!("failed to flush stdout: {e}")))?;
    Ok(())
}
