//! Voice upload gateway for parla.
//!
//! This crate provides a trait-based abstraction over the voice server's
//! upload endpoint, with an HTTP multipart implementation.

mod http;

use async_trait::async_trait;
pub use bytes::Bytes;
pub use http::{HttpGatewayConfig, HttpVoiceGateway};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while uploading a voice clip.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("server returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed server response: {0}")]
    MalformedResponse(String),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// The server's reply to a voice upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadReply {
    /// Conversational reply to show on the timeline
    #[serde(default)]
    pub message: Option<String>,

    /// Transcription of the uploaded clip, if the server produced one
    #[serde(default)]
    pub transcription: Option<String>,
}

impl UploadReply {
    /// The text to put on the timeline: the conversational reply when
    /// present, otherwise the transcription.
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.transcription.as_deref())
    }
}

/// Trait for voice upload backends.
///
/// Implement this trait to target other voice servers or to mock the wire
/// in tests.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Upload one finished clip.
    ///
    /// # Arguments
    /// * `audio` - Complete WAV data as reference-counted bytes. Cloning
    ///             `Bytes` is O(1), so callers keep their copy for free.
    async fn upload(&self, audio: Bytes) -> Result<UploadReply>;

    /// Returns the name of this gateway for logging/debugging.
    fn name(&self) -> &str;
}
