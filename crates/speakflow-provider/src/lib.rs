pub mod anthropic;
pub mod azure_speech;
pub mod elevenlabs;
pub mod gemini;
pub mod google_translate;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use speakflow_schema::{AssessmentResult, Language, Transcription};

pub use anthropic::AnthropicProvider;
pub use azure_speech::AzureSpeechProvider;
pub use elevenlabs::{ElevenLabsProvider, VoiceSettings};
pub use gemini::GeminiProvider;
pub use google_translate::GoogleTranslateProvider;
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Speech recognition and pronunciation assessment.
#[async_trait]
pub trait SpeechAssessor: Send + Sync {
    async fn transcribe(&self, audio: Bytes, language: &Language) -> Result<Transcription>;
    async fn assess(
        &self,
        audio: Bytes,
        reference_text: &str,
        language: &Language,
    ) -> Result<AssessmentResult>;
}

/// Text-to-speech. Returns encoded audio (mp3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &Language) -> Result<Bytes>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String>;
}

// ============================================================
// Error classification
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

/// Formats a non-success provider response. Auth failures mention
/// `authentication` so callers can surface a credentials hint.
pub(crate) fn format_status_error(
    provider: &str,
    status: reqwest::StatusCode,
    detail: Option<&str>,
) -> anyhow::Error {
    let kind = ProviderErrorKind::from_status(status);
    let retryable = if kind.is_retryable() {
        " [retryable]"
    } else {
        ""
    };
    let auth = if kind == ProviderErrorKind::AuthError {
        " authentication failed"
    } else {
        ""
    };
    match detail {
        Some(detail) if !detail.is_empty() => {
            anyhow!("{provider} api error ({status}){retryable}{auth}: {detail}")
        }
        _ => anyhow!("{provider} api error ({status}){retryable}{auth}"),
    }
}

pub(crate) fn send_error(provider: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow!("{provider} api error (timeout) [retryable]: request timed out")
    } else if error.is_connect() {
        anyhow!("{provider} api error (connect) [retryable]: {error}")
    } else {
        error.into()
    }
}

// ============================================================
// Provider Configuration
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    Gemini,
    /// Offline canned replies, no network.
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::Anthropic => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("anthropic requires api_key"))?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or("https://api.anthropic.com");
            Arc::new(AnthropicProvider::new(key.clone(), base_url))
        }
        ProviderType::Gemini => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("gemini requires api_key"))?;
            match config.base_url.as_deref() {
                Some(base_url) => Arc::new(GeminiProvider::new_with_base(key.clone(), base_url)),
                None => Arc::new(GeminiProvider::new(key.clone())),
            }
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    tracing::info!("Created llm provider ({:?})", config.provider_type);
    Ok(provider)
}

pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(LlmResponse {
            text: format!("[stub:{}] {}", request.model, user_text),
            input_tokens: None,
            output_tokens: None,
            stop_reason: Some("end_turn".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_kind_classification() {
        assert_eq!(
            ProviderErrorKind::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderErrorKind::from_status(reqwest::StatusCode::FORBIDDEN),
            ProviderErrorKind::AuthError
        );
        assert_eq!(
            ProviderErrorKind::from_status(reqwest::StatusCode::UNPROCESSABLE_ENTITY),
            ProviderErrorKind::InvalidRequest
        );
        assert!(ProviderErrorKind::Timeout.is_retryable());
        assert!(!ProviderErrorKind::AuthError.is_retryable());
    }

    #[test]
    fn auth_status_error_mentions_authentication() {
        let err = format_status_error("azure speech", reqwest::StatusCode::UNAUTHORIZED, None);
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("authentication"));
        assert!(!text.contains("[retryable]"));
    }

    #[test]
    fn server_status_error_is_retryable() {
        let err = format_status_error(
            "gemini",
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
            Some("overloaded"),
        );
        let text = err.to_string();
        assert!(text.contains("[retryable]"));
        assert!(text.ends_with("overloaded"));
    }

    #[test]
    fn create_provider_requires_key_for_remote_types() {
        let err = create_provider(&ProviderConfig::new(ProviderType::Anthropic))
            .err()
            .unwrap();
        assert!(err.to_string().contains("anthropic requires api_key"));
        assert!(create_provider(&ProviderConfig::new(ProviderType::Stub)).is_ok());
    }

    #[test]
    fn provider_config_deserializes_type_tag() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"type":"gemini","api_key":"k"}"#).unwrap();
        assert_eq!(config.provider_type, ProviderType::Gemini);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert!(config.base_url.is_none());
    }

    #[tokio::test]
    async fn stub_provider_echoes_last_message() {
        let resp = StubProvider
            .chat(LlmRequest::simple("m".into(), None, "ping".into()))
            .await
            .unwrap();
        assert_eq!(resp.text, "[stub:m] ping");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
    }
}
