//! Newline-delimited JSON transport.
//!
//! One message per line in both directions. Malformed host lines are logged
//! and skipped.

use docsync_bundle::WorkerManifest;
use docsync_protocol::{InboundMessage, OutboundMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::outbox::Outbox;
use crate::runtime::RuntimeLoader;
use crate::worker::Worker;
use crate::{Error, Result};

/// Capacity of the host → worker queue.
pub const INBOUND_QUEUE: usize = 64;

/// Run a worker over a reader/writer pair until the host closes its side.
///
/// The worker's result is returned once every outbound message has been
/// written.
pub async fn serve<L, R, W>(manifest: WorkerManifest, loader: L, reader: R, writer: W) -> Result<()>
where
    L: RuntimeLoader,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (outbox, outbound) = Outbox::channel();
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    let worker = Worker::new(manifest, outbox);

    let worker_task = async move {
        let run = worker.run(loader, inbound_rx);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => result,
            read = read_inbound(reader, inbound_tx) => {
                if let Err(err) = read {
                    tracing::warn!("Stopped reading host messages: {}", err);
                }
                run.await
            }
        }
    };

    let (result, written) = tokio::join!(worker_task, write_outbound(outbound, writer));
    if let Err(err) = written {
        tracing::warn!("Stopped writing worker messages: {}", err);
    }
    result
}

/// Decode host lines into `tx` until EOF.
pub async fn read_inbound<R>(reader: R, tx: mpsc::Sender<InboundMessage>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match InboundMessage::from_json(&line) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    return Err(Error::ChannelClosed("inbound channel".to_string()));
                }
            }
            Err(err) => tracing::warn!("Skipping malformed host message: {}", err),
        }
    }
    tracing::debug!("Host input reached EOF");
    Ok(())
}

/// Encode worker messages from `rx` as lines until every sender is gone.
pub async fn write_outbound<W>(mut rx: mpsc::UnboundedReceiver<OutboundMessage>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = message.to_json_line()?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
