//! Google Cloud Translation (v2 basic) client.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{format_status_error, send_error, Translator};

const GOOGLE_TRANSLATE_API_BASE: &str = "https://translation.googleapis.com";

#[derive(Debug, Clone)]
pub struct GoogleTranslateProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl GoogleTranslateProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::new_with_base(api_key, GOOGLE_TRANSLATE_API_BASE)
    }

    pub fn new_with_base(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslateProvider {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String> {
        let url = format!("{}/language/translate/v2", self.api_base);
        let payload = TranslateRequest {
            q: text,
            source: from,
            target: to,
            format: "text",
        };

        let resp = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| send_error("google translate", e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&text)
                .ok()
                .map(|e| e.error.message);
            return Err(format_status_error(
                "google translate",
                status,
                detail.as_deref(),
            ));
        }

        let body: TranslateResponse = resp.json().await?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| anyhow!("google translate api error: empty translations"))
    }
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}
