//! Progress accounting and chunk accumulation for one transfer.

use peerdrop_common::FileMetadata;

use super::TransferError;

/// Byte counters and, on the receiving side, the chunks received so far.
///
/// `bytes_transferred` never exceeds `total_bytes`, and `total_bytes` is
/// fixed once metadata is accepted.
#[derive(Debug, Clone, Default)]
pub struct TransferState {
    metadata: Option<FileMetadata>,
    bytes_transferred: u64,
    total_bytes: u64,
    chunks: Vec<Vec<u8>>,
    complete: bool,
}

impl TransferState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh transfer of `metadata.size` bytes, dropping anything accumulated.
    pub fn begin(&mut self, metadata: FileMetadata) {
        self.reset();
        self.total_bytes = metadata.size;
        self.metadata = Some(metadata);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Append a received chunk.
    pub fn push_chunk(&mut self, data: Vec<u8>) -> Result<(), TransferError> {
        if self.metadata.is_none() {
            return Err(TransferError::Violation("chunk before metadata".into()));
        }
        let next = self.bytes_transferred + data.len() as u64;
        if next > self.total_bytes {
            return Err(TransferError::Violation(format!(
                "chunk overruns announced size ({next} > {})",
                self.total_bytes
            )));
        }
        self.bytes_transferred = next;
        self.chunks.push(data);
        Ok(())
    }

    /// Record cumulative bytes sent. Never moves backwards or past the total.
    pub fn record_sent(&mut self, bytes: u64) {
        self.bytes_transferred = self.bytes_transferred.max(bytes).min(self.total_bytes);
    }

    /// Concatenate the received chunks and mark the transfer complete.
    pub fn finish(&mut self) -> Vec<u8> {
        self.complete = true;
        reassemble(std::mem::take(&mut self.chunks))
    }

    pub fn mark_complete(&mut self) {
        self.bytes_transferred = self.total_bytes;
        self.complete = true;
    }

    /// Free buffered chunks without touching the counters.
    pub fn discard_chunks(&mut self) {
        self.chunks = Vec::new();
    }

    pub fn metadata(&self) -> Option<&FileMetadata> {
        self.metadata.as_ref()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn chunks_received(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Percent complete. A zero-byte transfer counts as fully done.
    pub fn progress_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Number of chunk frames for a file of `size` bytes.
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size as u64)
}

/// Split `bytes` into consecutive slices of `chunk_size`; the last may be shorter.
pub fn chunkify(bytes: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if chunk_size == 0 {
        return Vec::new();
    }
    bytes.chunks(chunk_size).map(<[u8]>::to_vec).collect()
}

pub fn reassemble(chunks: Vec<Vec<u8>>) -> Vec<u8> {
    let total = chunks.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in chunks {
        out.extend_from_slice(&chunk);
    }
    out
}
