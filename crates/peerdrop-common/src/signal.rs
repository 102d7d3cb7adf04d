//! Relay wire schema.
//!
//! Every relay message is a single JSON object with a `type`, the session
//! `code`, an opaque `payload`, and an optional `error` string. Negotiation
//! payloads (offers, answers, candidates) are never interpreted here; they
//! travel between peers verbatim.

use serde::{Deserialize, Serialize};

/// Opaque negotiation payload, passed through verbatim.
pub type SignalPayload = serde_json::Value;

// ---------------------------------------------------------------------------
// File metadata
// ---------------------------------------------------------------------------

/// Description of the file on offer. Announced over the relay on `create`
/// and repeated in the first frame on the direct channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    /// MIME type; may be empty.
    #[serde(rename = "mimeType", alias = "type", default)]
    pub mime_type: String,
    /// Hex SHA-256 of the content, present only when digest checks are on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl FileMetadata {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            sha256: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// Value of the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Create,
    Created,
    Join,
    Joined,
    ReceiverJoined,
    Accept,
    Offer,
    Answer,
    IceCandidate,
    Close,
    Error,
    /// Any `type` this build does not know about.
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: SignalPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignalMessage {
    pub fn new(kind: SignalKind, code: impl Into<String>, payload: SignalPayload) -> Self {
        Self {
            kind,
            code: code.into(),
            payload,
            error: None,
        }
    }

    pub fn create(metadata: &FileMetadata) -> Self {
        Self::new(SignalKind::Create, "", metadata_payload(metadata))
    }

    pub fn created(code: &str) -> Self {
        Self::new(
            SignalKind::Created,
            code,
            serde_json::json!({ "code": code }),
        )
    }

    pub fn join(code: &str) -> Self {
        Self::new(SignalKind::Join, code, serde_json::json!({}))
    }

    pub fn joined(code: &str, metadata: &FileMetadata) -> Self {
        Self::new(SignalKind::Joined, code, metadata_payload(metadata))
    }

    pub fn receiver_joined(code: &str) -> Self {
        Self::new(SignalKind::ReceiverJoined, code, serde_json::json!({}))
    }

    pub fn accept(code: &str) -> Self {
        Self::new(SignalKind::Accept, code, serde_json::json!({}))
    }

    pub fn close(code: &str) -> Self {
        Self::new(SignalKind::Close, code, SignalPayload::Null)
    }

    /// A `close` carrying a reason, sent by the relay when a peer vanishes.
    pub fn close_with_error(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::close(code)
        }
    }

    pub fn error(code: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            kind: SignalKind::Error,
            code: code.to_string(),
            payload: serde_json::json!({ "error": error }),
            error: Some(error),
        }
    }

    /// Error text from the `error` field, falling back to `payload.error`.
    pub fn error_text(&self) -> Option<String> {
        self.error
            .clone()
            .filter(|e| !e.is_empty())
            .or_else(|| {
                self.payload
                    .get("error")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
    }

    /// Session code from the `code` field, falling back to `payload.code`.
    pub fn effective_code(&self) -> Option<String> {
        if !self.code.is_empty() {
            return Some(self.code.clone());
        }
        self.payload
            .get("code")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Decode the payload as file metadata (`create` and `joined`).
    pub fn metadata(&self) -> Result<FileMetadata, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn metadata_payload(metadata: &FileMetadata) -> SignalPayload {
    serde_json::to_value(metadata).unwrap_or(SignalPayload::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_use_kebab_case() {
        let msg = SignalMessage::new(
            SignalKind::IceCandidate,
            "123456",
            serde_json::json!({ "candidate": "c" }),
        );
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"ice-candidate\""));

        let msg = SignalMessage::receiver_joined("123456");
        assert!(msg.to_json().unwrap().contains("\"receiver-joined\""));
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let msg: SignalMessage =
            serde_json::from_str(r#"{"type":"teleport","code":"111111"}"#).unwrap();
        assert_eq!(msg.kind, SignalKind::Unknown);
        assert_eq!(msg.code, "111111");
    }

    #[test]
    fn missing_fields_default() {
        let msg: SignalMessage = serde_json::from_str(r#"{"type":"close"}"#).unwrap();
        assert_eq!(msg.kind, SignalKind::Close);
        assert!(msg.code.is_empty());
        assert!(msg.payload.is_null());
        assert!(msg.error.is_none());
    }

    #[test]
    fn null_payload_is_accepted() {
        let msg: SignalMessage =
            serde_json::from_str(r#"{"type":"created","code":"222222","payload":null}"#).unwrap();
        assert_eq!(msg.effective_code().as_deref(), Some("222222"));
    }

    #[test]
    fn metadata_accepts_legacy_type_field() {
        let msg: SignalMessage = serde_json::from_str(
            r#"{"type":"joined","code":"333333","payload":{"name":"a.txt","size":40000,"type":"text/plain"}}"#,
        )
        .unwrap();
        let meta = msg.metadata().unwrap();
        assert_eq!(meta.name, "a.txt");
        assert_eq!(meta.size, 40000);
        assert_eq!(meta.mime_type, "text/plain");
        assert!(meta.sha256.is_none());
    }

    #[test]
    fn metadata_serializes_mime_type_camel_case() {
        let meta = FileMetadata::new("photo.png", 10, "image/png");
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"mimeType\":\"image/png\""));
        assert!(!json.contains("sha256"));
    }

    #[test]
    fn error_text_prefers_top_level_field() {
        let msg = SignalMessage::error("", "Session not found");
        assert_eq!(msg.error_text().as_deref(), Some("Session not found"));

        let msg: SignalMessage =
            serde_json::from_str(r#"{"type":"error","payload":{"error":"boom"}}"#).unwrap();
        assert_eq!(msg.error_text().as_deref(), Some("boom"));
    }

    #[test]
    fn close_with_error_carries_reason() {
        let msg = SignalMessage::close_with_error("444444", "Peer disconnected");
        assert_eq!(msg.kind, SignalKind::Close);
        assert_eq!(msg.error_text().as_deref(), Some("Peer disconnected"));
        assert!(SignalMessage::close("444444").error_text().is_none());
    }

    #[test]
    fn created_carries_code_in_both_places() {
        let msg = SignalMessage::created("555555");
        assert_eq!(msg.code, "555555");
        assert_eq!(msg.payload["code"], "555555");
    }
}
