//! HTTP multipart client for the voice upload endpoint.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{GatewayError, Result, UploadReply, VoiceGateway};

const UPLOAD_PATH: &str = "voice/upload";
const AUDIO_FIELD: &str = "voiceNote";
const AUDIO_MIME: &str = "audio/wav";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the HTTP voice gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Base URL of the voice server
    pub base_url: String,

    /// Bearer token sent with every request
    pub auth_token: Option<String>,

    /// Per-request timeout (defaults to 30 seconds)
    pub timeout: Duration,
}

impl HttpGatewayConfig {
    /// Create a new gateway config for the given server.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the upload endpoint.
    pub fn upload_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), UPLOAD_PATH)
    }
}

/// HTTP client for the voice upload endpoint.
#[derive(Debug, Clone)]
pub struct HttpVoiceGateway {
    client: reqwest::Client,
    config: HttpGatewayConfig,
}

impl HttpVoiceGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: HttpGatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

/// File name for an uploaded clip, unique per wall-clock millisecond.
fn upload_file_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("voice_{millis}.wav")
}

#[async_trait]
impl VoiceGateway for HttpVoiceGateway {
    async fn upload(&self, audio: Bytes) -> Result<UploadReply> {
        let file_name = upload_file_name();
        debug!(
            url = %self.config.upload_url(),
            audio_bytes = audio.len(),
            file_name = %file_name,
            "Uploading voice clip"
        );

        let form = reqwest::multipart::Form::new().part(
            AUDIO_FIELD,
            reqwest::multipart::Part::bytes(audio.to_vec())
                .file_name(file_name)
                .mime_str(AUDIO_MIME)?,
        );

        let mut request = self
            .client
            .post(self.config.upload_url())
            .multipart(form)
            .timeout(self.config.timeout);

        if let Some(token) = &self.config.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http { status, body });
        }

        let reply: UploadReply = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        debug!(
            has_message = reply.message.is_some(),
            has_transcription = reply.transcription.is_some(),
            "Upload accepted"
        );

        Ok(reply)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_url_joins_base() {
        let config = HttpGatewayConfig::new("https://voice.example.com");
        assert_eq!(config.upload_url(), "https://voice.example.com/voice/upload");

        let trailing = HttpGatewayConfig::new("https://voice.example.com/");
        assert_eq!(
            trailing.upload_url(),
            "https://voice.example.com/voice/upload"
        );
    }

    #[test]
    fn test_upload_file_name_shape() {
        let name = upload_file_name();
        assert!(name.starts_with("voice_"));
        assert!(name.ends_with(".wav"));
        assert!(name.len() > "voice_.wav".len());
    }

    #[test]
    fn test_config_builder() {
        let config = HttpGatewayConfig::new("http://localhost:8080")
            .with_auth_token("tok")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.auth_token.as_deref(), Some("tok"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
