use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use speakflow_schema::Language;

use crate::{format_status_error, send_error, SpeechSynthesizer};

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";
pub const DEFAULT_VOICE_ID: &str = "IKne3meq5aSn9XLyUdCD";
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

/// Voice tuning sent with every synthesis request. The defaults favour a
/// slow, stable delivery so tones stay audible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.85,
            similarity_boost: 0.85,
            style: 0.35,
            use_speaker_boost: true,
            speed: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElevenLabsProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    voice_id: String,
    model_id: String,
    settings: VoiceSettings,
}

impl ElevenLabsProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::new_with_base(api_key, ELEVENLABS_API_BASE)
    }

    pub fn new_with_base(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            settings: VoiceSettings::default(),
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_settings(mut self, settings: VoiceSettings) -> Self {
        self.settings = settings;
        self
    }

    fn build_request<'a>(&'a self, text: &'a str) -> TtsRequest<'a> {
        TtsRequest {
            text,
            model_id: &self.model_id,
            voice_settings: &self.settings,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsProvider {
    async fn synthesize(&self, text: &str, language: &Language) -> Result<Bytes> {
        let url = format!("{}/v1/text-to-speech/{}", self.api_base, self.voice_id);
        tracing::debug!(language = %language, chars = text.chars().count(), "synthesizing speech");

        let resp = self
            .client
            .post(url)
            .header("accept", "audio/mpeg")
            .header("content-type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| send_error("elevenlabs", e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&text)
                .ok()
                .and_then(ApiError::message)
                .unwrap_or(text);
            return Err(format_status_error("elevenlabs", status, Some(&detail)));
        }

        Ok(resp.bytes().await?)
    }
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

/// `detail` is either a plain string or `{status, message}`.
#[derive(Debug, Deserialize)]
struct ApiError {
    detail: serde_json::Value,
}

impl ApiError {
    fn message(self) -> Option<String> {
        match self.detail {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_model_and_voice_settings() {
        let provider = ElevenLabsProvider::new("k");
        let value = serde_json::to_value(provider.build_request("你好")).unwrap();

        assert_eq!(value["text"], "你好");
        assert_eq!(value["model_id"], "eleven_multilingual_v2");
        assert_eq!(value["voice_settings"]["use_speaker_boost"], true);
        assert!(value["voice_settings"]["speed"].as_f64().unwrap() < 0.71);
    }

    #[test]
    fn api_error_message_reads_both_detail_shapes() {
        let nested: ApiError = serde_json::from_value(serde_json::json!({
            "detail": {"status": "quota_exceeded", "message": "quota exceeded"}
        }))
        .unwrap();
        assert_eq!(nested.message().as_deref(), Some("quota exceeded"));

        let flat: ApiError =
            serde_json::from_value(serde_json::json!({"detail": "bad voice"})).unwrap();
        assert_eq!(flat.message().as_deref(), Some("bad voice"));
    }

    #[test]
    fn builders_override_voice_and_model() {
        let provider = ElevenLabsProvider::new_with_base("k", "http://localhost:1/")
            .with_voice("v1")
            .with_model("m1");
        assert_eq!(provider.api_base, "http://localhost:1");
        assert_eq!(provider.voice_id, "v1");
        assert_eq!(provider.model_id, "m1");
    }
}
