//! Sending side of the transfer protocol.

use peerdrop_common::FileMetadata;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::frame::{encode_chunk, Frame};
use super::TransferError;
use crate::transport::ChannelHandle;

/// Reports from a running sender task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendUpdate {
    /// Cumulative bytes handed to the channel.
    Progress(u64),
    Finished(u64),
    Failed(String),
}

/// Stream `source` over `channel`: metadata, chunks of `chunk_size`, completion.
///
/// Each chunk is sent and awaited before the next slice is read, so at most
/// one chunk is in flight.
pub async fn send_file<R>(
    channel: &ChannelHandle,
    metadata: &FileMetadata,
    mut source: R,
    chunk_size: usize,
    updates: &mpsc::Sender<SendUpdate>,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin,
{
    channel.send(Frame::Metadata(metadata.clone()).encode()?).await?;

    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent = 0u64;
    while sent < metadata.size {
        let want = (metadata.size - sent).min(buf.len() as u64) as usize;
        if let Err(e) = source.read_exact(&mut buf[..want]).await {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(TransferError::ShortRead {
                    read: sent,
                    expected: metadata.size,
                });
            }
            return Err(e.into());
        }

        channel.send(encode_chunk(&buf[..want])).await?;
        sent += want as u64;
        let _ = updates.send(SendUpdate::Progress(sent)).await;
    }

    channel.send(Frame::Complete.encode()?).await?;
    debug!(bytes = sent, "Completion frame sent");
    Ok(sent)
}

/// Task body: run [`send_file`] and report how it ended.
pub async fn run_sender<R>(
    channel: ChannelHandle,
    metadata: FileMetadata,
    source: R,
    chunk_size: usize,
    updates: mpsc::Sender<SendUpdate>,
) where
    R: AsyncRead + Unpin,
{
    match send_file(&channel, &metadata, source, chunk_size, &updates).await {
        Ok(bytes) => {
            info!(file = %metadata.name, bytes, "File sent");
            let _ = updates.send(SendUpdate::Finished(bytes)).await;
        }
        Err(e) => {
            warn!(file = %metadata.name, error = %e, "Send failed");
            let _ = updates.send(SendUpdate::Failed(e.to_string())).await;
        }
    }
}
