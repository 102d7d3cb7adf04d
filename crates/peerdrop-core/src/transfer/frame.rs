//! Tagged frames on the direct channel.
//!
//! Every unit is `[tag: u8][body]`. The tag alone decides how the body is
//! read, so a chunk whose bytes happen to look like JSON is still a chunk.

use peerdrop_common::FileMetadata;

use super::TransferError;

/// Frame type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameTag {
    Metadata = 0x01,
    Chunk = 0x02,
    Complete = 0x03,
}

impl TryFrom<u8> for FrameTag {
    type Error = TransferError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Metadata),
            0x02 => Ok(Self::Chunk),
            0x03 => Ok(Self::Complete),
            other => Err(TransferError::Malformed(format!(
                "unknown frame tag: 0x{other:02X}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Metadata(FileMetadata),
    Chunk(Vec<u8>),
    Complete,
}

impl Frame {
    pub fn encode(&self) -> Result<Vec<u8>, TransferError> {
        match self {
            Self::Metadata(metadata) => {
                let body = serde_json::to_vec(metadata)
                    .map_err(|e| TransferError::Malformed(format!("metadata encode: {e}")))?;
                let mut out = Vec::with_capacity(1 + body.len());
                out.push(FrameTag::Metadata as u8);
                out.extend_from_slice(&body);
                Ok(out)
            }
            Self::Chunk(data) => Ok(encode_chunk(data)),
            Self::Complete => Ok(vec![FrameTag::Complete as u8]),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransferError> {
        let (&tag, body) = bytes
            .split_first()
            .ok_or_else(|| TransferError::Malformed("empty frame".into()))?;

        match FrameTag::try_from(tag)? {
            FrameTag::Metadata => serde_json::from_slice(body)
                .map(Self::Metadata)
                .map_err(|e| TransferError::Malformed(format!("bad metadata: {e}"))),
            FrameTag::Chunk => Ok(Self::Chunk(body.to_vec())),
            FrameTag::Complete => Ok(Self::Complete),
        }
    }
}

/// Encode a chunk frame straight from a borrowed slice.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + data.len());
    out.push(FrameTag::Chunk as u8);
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_frame_keeps_its_fields() {
        let meta = FileMetadata::new("song.mp3", 40_000, "audio/mpeg");
        let bytes = Frame::Metadata(meta.clone()).encode().unwrap();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::Metadata(meta));
    }

    #[test]
    fn chunk_that_looks_like_json_is_still_a_chunk() {
        let payload = br#"{"name":"x","size":1}"#;
        let bytes = encode_chunk(payload);
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::Chunk(payload.to_vec()));
    }

    #[test]
    fn complete_frame_is_a_single_byte() {
        let bytes = Frame::Complete.encode().unwrap();
        assert_eq!(bytes, vec![0x03]);
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::Complete);
    }

    #[test]
    fn empty_unit_is_malformed() {
        assert!(matches!(
            Frame::decode(&[]),
            Err(TransferError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let err = Frame::decode(&[0x7F, 1, 2]).unwrap_err();
        assert!(err.to_string().contains("0x7F"));
    }

    #[test]
    fn metadata_tag_with_garbage_body_is_malformed() {
        assert!(matches!(
            Frame::decode(&[0x01, b'{']),
            Err(TransferError::Malformed(_))
        ));
    }
}
