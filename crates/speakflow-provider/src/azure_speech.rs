//! Azure Speech short-audio REST client with pronunciation assessment.
//!
//! The detailed result JSON is decoded into `speakflow_schema` types here.
//! Scores may be reported flat or nested under `PronunciationAssessment`
//! depending on API version; both shapes are accepted and every score is
//! clamped into [0, 100].

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use speakflow_schema::{
    AssessmentResult, ErrorType, Language, NBestPhoneme, Phoneme, Transcription, Word,
};

use crate::{format_status_error, send_error, SpeechAssessor};

const RECOGNITION_PATH: &str = "/speech/recognition/conversation/cognitiveservices/v1";
const WAV_CONTENT_TYPE: &str = "audio/wav; codecs=audio/pcm; samplerate=16000";
const NBEST_PHONEME_COUNT: u32 = 5;

#[derive(Debug, Clone)]
pub struct AzureSpeechProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl AzureSpeechProvider {
    pub fn new(api_key: impl Into<String>, region: &str) -> Self {
        Self::new_with_base(api_key, format!("https://{region}.stt.speech.microsoft.com"))
    }

    pub fn new_with_base(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn recognize(
        &self,
        audio: Bytes,
        language: &Language,
        assessment_header: Option<String>,
    ) -> Result<RecognitionResponse> {
        let url = format!("{}{}", self.api_base, RECOGNITION_PATH);
        let mut req = self
            .client
            .post(url)
            .query(&[("language", language.tag()), ("format", "detailed")])
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("content-type", WAV_CONTENT_TYPE)
            .header("accept", "application/json")
            .body(audio);
        if let Some(header) = assessment_header {
            req = req.header("Pronunciation-Assessment", header);
        }

        let resp = req.send().await.map_err(|e| send_error("azure speech", e))?;
        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(format_status_error("azure speech", status, Some(&text)));
        }

        resp.json::<RecognitionResponse>()
            .await
            .context("failed to decode azure speech response")
    }
}

#[async_trait]
impl SpeechAssessor for AzureSpeechProvider {
    async fn transcribe(&self, audio: Bytes, language: &Language) -> Result<Transcription> {
        tracing::debug!(language = %language, bytes = audio.len(), "transcribing audio");
        let response = self.recognize(audio, language, None).await?;
        response.into_transcription()
    }

    async fn assess(
        &self,
        audio: Bytes,
        reference_text: &str,
        language: &Language,
    ) -> Result<AssessmentResult> {
        tracing::debug!(language = %language, reference_text, "assessing pronunciation");
        let header = assessment_header(reference_text)?;
        let response = self.recognize(audio, language, Some(header)).await?;
        response.into_assessment()
    }
}

/// Parses a raw detailed recognition response into an assessment.
pub fn parse_assessment(json: &str) -> Result<AssessmentResult> {
    let response: RecognitionResponse =
        serde_json::from_str(json).context("invalid azure speech detailed result")?;
    response.into_assessment()
}

fn assessment_header(reference_text: &str) -> Result<String> {
    let params = AssessmentParams {
        reference_text: reference_text.to_string(),
        grading_system: "HundredMark",
        granularity: "Phoneme",
        dimension: "Comprehensive",
        enable_miscue: true,
        enable_prosody_assessment: true,
        n_best_phoneme_count: NBEST_PHONEME_COUNT,
    };
    let json = serde_json::to_vec(&params)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

fn clamp_score(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssessmentParams {
    reference_text: String,
    grading_system: &'static str,
    granularity: &'static str,
    dimension: &'static str,
    enable_miscue: bool,
    enable_prosody_assessment: bool,
    #[serde(rename = "NBestPhonemeCount")]
    n_best_phoneme_count: u32,
}

// ============================================================
// Azure Speech API Types
// ============================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    #[serde(default)]
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
    #[serde(default, rename = "NBest")]
    nbest: Vec<RawNBest>,
}

impl RecognitionResponse {
    fn into_transcription(self) -> Result<Transcription> {
        match self.recognition_status.as_str() {
            "Success" => {
                let text = self
                    .display_text
                    .or_else(|| self.nbest.first().and_then(|n| n.display.clone()))
                    .unwrap_or_default();
                if text.trim().is_empty() {
                    Ok(Transcription::NoSpeech)
                } else {
                    Ok(Transcription::Recognized { text })
                }
            }
            "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => Ok(Transcription::NoSpeech),
            other => bail!("speech recognition failed: {other}"),
        }
    }

    fn into_assessment(self) -> Result<AssessmentResult> {
        if self.recognition_status != "Success" {
            bail!(
                "speech not recognized for assessment (no match): {}",
                self.recognition_status
            );
        }
        let best = self
            .nbest
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("azure speech result has no NBest entry"))?;
        Ok(best.into_assessment())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawScores {
    #[serde(default)]
    accuracy_score: Option<f64>,
    #[serde(default)]
    fluency_score: Option<f64>,
    #[serde(default)]
    completeness_score: Option<f64>,
    #[serde(default)]
    pron_score: Option<f64>,
    #[serde(default)]
    prosody_score: Option<f64>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default, rename = "NBestPhonemes")]
    nbest_phonemes: Vec<RawNBestPhoneme>,
}

impl RawScores {
    /// Nested assessment values win over flat ones.
    fn merge(flat: RawScores, nested: Option<RawScores>) -> RawScores {
        let Some(nested) = nested else {
            return flat;
        };
        RawScores {
            accuracy_score: nested.accuracy_score.or(flat.accuracy_score),
            fluency_score: nested.fluency_score.or(flat.fluency_score),
            completeness_score: nested.completeness_score.or(flat.completeness_score),
            pron_score: nested.pron_score.or(flat.pron_score),
            prosody_score: nested.prosody_score.or(flat.prosody_score),
            error_type: nested.error_type.or(flat.error_type),
            nbest_phonemes: if nested.nbest_phonemes.is_empty() {
                flat.nbest_phonemes
            } else {
                nested.nbest_phonemes
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawNBest {
    #[serde(default)]
    display: Option<String>,
    #[serde(flatten)]
    scores: RawScores,
    #[serde(default)]
    pronunciation_assessment: Option<RawScores>,
    #[serde(default)]
    words: Vec<RawWord>,
}

impl RawNBest {
    fn into_assessment(self) -> AssessmentResult {
        let scores = RawScores::merge(self.scores, self.pronunciation_assessment);
        AssessmentResult {
            pronunciation_score: clamp_score(scores.pron_score.unwrap_or_default()),
            accuracy_score: clamp_score(scores.accuracy_score.unwrap_or_default()),
            fluency_score: clamp_score(scores.fluency_score.unwrap_or_default()),
            completeness_score: clamp_score(scores.completeness_score.unwrap_or_default()),
            prosody_score: scores.prosody_score.map(clamp_score),
            words: self.words.into_iter().map(RawWord::into_word).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawWord {
    #[serde(default)]
    word: String,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    duration: u64,
    #[serde(flatten)]
    scores: RawScores,
    #[serde(default)]
    pronunciation_assessment: Option<RawScores>,
    #[serde(default)]
    phonemes: Vec<RawPhoneme>,
}

impl RawWord {
    fn into_word(self) -> Word {
        let scores = RawScores::merge(self.scores, self.pronunciation_assessment);
        Word {
            text: self.word,
            offset: self.offset,
            duration: self.duration,
            error_type: scores
                .error_type
                .as_deref()
                .map(ErrorType::from_label)
                .unwrap_or_default(),
            accuracy_score: clamp_score(scores.accuracy_score.unwrap_or_default()),
            phonemes: self.phonemes.into_iter().map(RawPhoneme::into_phoneme).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPhoneme {
    #[serde(default)]
    phoneme: String,
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    duration: u64,
    #[serde(flatten)]
    scores: RawScores,
    #[serde(default)]
    pronunciation_assessment: Option<RawScores>,
}

impl RawPhoneme {
    fn into_phoneme(self) -> Phoneme {
        let scores = RawScores::merge(self.scores, self.pronunciation_assessment);
        Phoneme {
            symbol: self.phoneme,
            score: clamp_score(scores.accuracy_score.unwrap_or_default()),
            offset: self.offset,
            duration: self.duration,
            nbest: scores
                .nbest_phonemes
                .into_iter()
                .map(|candidate| NBestPhoneme {
                    phoneme: candidate.phoneme,
                    score: clamp_score(candidate.score),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawNBestPhoneme {
    #[serde(default)]
    phoneme: String,
    #[serde(default)]
    score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_result() -> serde_json::Value {
        serde_json::json!({
            "RecognitionStatus": "Success",
            "DisplayText": "你好。",
            "NBest": [{
                "Display": "你好。",
                "PronunciationAssessment": {
                    "AccuracyScore": 71.0,
                    "FluencyScore": 55.0,
                    "CompletenessScore": 100.0,
                    "PronScore": 68.4
                },
                "Words": [{
                    "Word": "你好",
                    "Offset": 500000,
                    "Duration": 7000000,
                    "PronunciationAssessment": {"AccuracyScore": 71.0, "ErrorType": "Mispronunciation"},
                    "Phonemes": [
                        {
                            "Phoneme": "n",
                            "Offset": 500000,
                            "Duration": 1000000,
                            "PronunciationAssessment": {
                                "AccuracyScore": 92.0,
                                "NBestPhonemes": [{"Phoneme": "n", "Score": 92.0}]
                            }
                        },
                        {
                            "Phoneme": "i",
                            "Offset": 1500000,
                            "Duration": 1000000,
                            "PronunciationAssessment": {"AccuracyScore": 0.0}
                        }
                    ]
                }]
            }]
        })
    }

    #[test]
    fn nested_detailed_result_maps_to_assessment() {
        let assessment = parse_assessment(&nested_result().to_string()).unwrap();

        assert_eq!(assessment.accuracy_score, 71.0);
        assert_eq!(assessment.fluency_score, 55.0);
        assert_eq!(assessment.pronunciation_score, 68.4);
        assert_eq!(assessment.words.len(), 1);

        let word = &assessment.words[0];
        assert_eq!(word.text, "你好");
        assert_eq!(word.error_type, ErrorType::Mispronunciation);
        assert_eq!(word.end_ticks(), 7_500_000);
        assert_eq!(word.phonemes[0].top_alternative(), Some("n"));
        assert_eq!(word.phonemes[1].assessed_score(), None);
    }

    #[test]
    fn flat_scores_are_accepted() {
        let raw = serde_json::json!({
            "RecognitionStatus": "Success",
            "NBest": [{
                "AccuracyScore": 80.0,
                "FluencyScore": 90.0,
                "CompletenessScore": 100.0,
                "PronScore": 85.0,
                "Words": [{
                    "Word": "hello",
                    "AccuracyScore": 80.0,
                    "ErrorType": "None",
                    "Phonemes": [{"Phoneme": "h", "AccuracyScore": 80.0}]
                }]
            }]
        });
        let assessment = parse_assessment(&raw.to_string()).unwrap();
        assert_eq!(assessment.pronunciation_score, 85.0);
        assert_eq!(assessment.words[0].accuracy_score, 80.0);
        assert_eq!(assessment.words[0].phonemes[0].score, 80.0);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn no_match_is_reported_as_no_speech() {
        let raw: RecognitionResponse =
            serde_json::from_value(serde_json::json!({"RecognitionStatus": "NoMatch"})).unwrap();
        assert_eq!(raw.into_transcription().unwrap(), Transcription::NoSpeech);
    }

    #[test]
    fn failed_assessment_is_an_error() {
        let err = parse_assessment(r#"{"RecognitionStatus":"NoMatch"}"#).unwrap_err();
        assert!(err.to_string().contains("no match"));
    }

    #[test]
    fn assessment_header_is_base64_json() {
        let header = assessment_header("你好").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(header)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["ReferenceText"], "你好");
        assert_eq!(value["Granularity"], "Phoneme");
        assert_eq!(value["EnableMiscue"], true);
        assert_eq!(value["NBestPhonemeCount"], 5);
    }
}
