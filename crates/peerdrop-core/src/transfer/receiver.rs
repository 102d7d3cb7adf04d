//! Receiving side of the transfer protocol.

use peerdrop_common::FileMetadata;

use super::digest::sha256_hex;
use super::frame::Frame;
use super::state::TransferState;
use super::TransferError;

/// A fully reassembled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub metadata: FileMetadata,
    pub data: Vec<u8>,
}

/// What a single frame did to the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Metadata accepted; accumulation restarted.
    Started,
    /// A chunk was appended.
    Progress,
    Complete(ReceivedFile),
}

/// Apply one channel unit to `state`.
///
/// `announced` is the metadata the relay delivered on join; the metadata
/// frame must describe the same file. On any error the caller tears the
/// session down and the partial data is never exposed.
pub fn receive_frame(
    state: &mut TransferState,
    announced: Option<&FileMetadata>,
    bytes: &[u8],
) -> Result<ReceiveOutcome, TransferError> {
    if state.is_complete() {
        return Err(TransferError::Violation("frame after completion".into()));
    }

    match Frame::decode(bytes)? {
        Frame::Metadata(metadata) => {
            if let Some(announced) = announced {
                if announced.name != metadata.name || announced.size != metadata.size {
                    return Err(TransferError::Violation(format!(
                        "metadata mismatch: offered {} ({} bytes), got {} ({} bytes)",
                        announced.name, announced.size, metadata.name, metadata.size
                    )));
                }
            }
            state.begin(metadata);
            Ok(ReceiveOutcome::Started)
        }
        Frame::Chunk(data) => {
            state.push_chunk(data)?;
            Ok(ReceiveOutcome::Progress)
        }
        Frame::Complete => {
            let metadata = state
                .metadata()
                .cloned()
                .ok_or_else(|| TransferError::Violation("completion before metadata".into()))?;
            if state.bytes_transferred() != state.total_bytes() {
                return Err(TransferError::Violation(format!(
                    "transfer truncated at {} of {} bytes",
                    state.bytes_transferred(),
                    state.total_bytes()
                )));
            }

            let data = state.finish();
            if let Some(expected) = &metadata.sha256 {
                let actual = sha256_hex(&data);
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(TransferError::Violation("digest mismatch".into()));
                }
            }
            Ok(ReceiveOutcome::Complete(ReceivedFile { metadata, data }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::frame::encode_chunk;
    use crate::transfer::state::chunkify;

    fn frames_for(meta: &FileMetadata, data: &[u8], chunk: usize) -> Vec<Vec<u8>> {
        let mut frames = vec![Frame::Metadata(meta.clone()).encode().unwrap()];
        frames.extend(chunkify(data, chunk).iter().map(|c| encode_chunk(c)));
        frames.push(Frame::Complete.encode().unwrap());
        frames
    }

    #[test]
    fn forty_thousand_bytes_arrive_intact() {
        let data: Vec<u8> = (0..40_000u32).map(|i| (i % 256) as u8).collect();
        let meta = FileMetadata::new("data.bin", 40_000, "application/octet-stream");
        let mut state = TransferState::new();

        let mut last = None;
        let mut seen = Vec::new();
        for frame in frames_for(&meta, &data, 16_384) {
            last = Some(receive_frame(&mut state, Some(&meta), &frame).unwrap());
            seen.push(state.bytes_transferred());
        }

        assert_eq!(seen, vec![0, 16_384, 32_768, 40_000, 40_000]);
        assert_eq!(state.progress_percent(), 100.0);
        match last {
            Some(ReceiveOutcome::Complete(file)) => {
                assert_eq!(file.data.len(), 40_000);
                assert_eq!(file.data, data);
                assert_eq!(file.metadata, meta);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn chunk_before_metadata_is_rejected() {
        let mut state = TransferState::new();
        let err = receive_frame(&mut state, None, &encode_chunk(b"early")).unwrap_err();
        assert!(matches!(err, TransferError::Violation(_)));
        assert!(!state.is_complete());
        assert_eq!(state.chunks_received(), 0);
    }

    #[test]
    fn zero_byte_file_completes() {
        let meta = FileMetadata::new("empty.txt", 0, "text/plain");
        let mut state = TransferState::new();
        receive_frame(&mut state, Some(&meta), &Frame::Metadata(meta.clone()).encode().unwrap())
            .unwrap();
        assert_eq!(state.progress_percent(), 100.0);

        let outcome =
            receive_frame(&mut state, Some(&meta), &Frame::Complete.encode().unwrap()).unwrap();
        assert!(matches!(outcome, ReceiveOutcome::Complete(f) if f.data.is_empty()));
    }

    #[test]
    fn early_completion_is_truncation() {
        let meta = FileMetadata::new("a", 10, "");
        let mut state = TransferState::new();
        receive_frame(&mut state, None, &Frame::Metadata(meta).encode().unwrap()).unwrap();
        receive_frame(&mut state, None, &encode_chunk(&[0; 4])).unwrap();
        let err = receive_frame(&mut state, None, &[0x03]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn metadata_must_match_offer() {
        let offered = FileMetadata::new("a.txt", 10, "");
        let sent = FileMetadata::new("b.txt", 10, "");
        let mut state = TransferState::new();
        let err = receive_frame(
            &mut state,
            Some(&offered),
            &Frame::Metadata(sent).encode().unwrap(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn digest_is_verified_when_present() {
        let data = b"hello world".to_vec();
        let mut meta = FileMetadata::new("h.txt", data.len() as u64, "text/plain");
        meta.sha256 = Some(sha256_hex(b"something else"));

        let mut state = TransferState::new();
        let frames = frames_for(&meta, &data, 4);
        let (last, rest) = frames.split_last().unwrap();
        for frame in rest {
            receive_frame(&mut state, None, frame).unwrap();
        }
        let err = receive_frame(&mut state, None, last).unwrap_err();
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn frames_after_completion_are_rejected() {
        let meta = FileMetadata::new("a", 1, "");
        let mut state = TransferState::new();
        for frame in frames_for(&meta, &[7], 16) {
            receive_frame(&mut state, None, &frame).unwrap();
        }
        assert!(receive_frame(&mut state, None, &encode_chunk(&[1])).is_err());
    }
}
