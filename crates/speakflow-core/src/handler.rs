//! One request/response cycle: transcribe, assess, score, annotate, reply, persist.

use std::sync::Arc;

use anyhow::anyhow;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use speakflow_memory::ConversationStore;
use speakflow_provider::SpeechAssessor;
use speakflow_schema::{
    AssessmentResult, Conversation, ConversationDefaults, ConversationMessage, ErrorType,
    Feedback, Language, MessageFeedback, Mode, Transcription, Word, WordFeedback,
};

use crate::annotator::annotate_word;
use crate::feedback::compose;
use crate::scoring::{self, total_duration_secs};
use crate::translation::TranslationService;
use crate::tutor::Tutor;

pub const LANGUAGE_MISMATCH_WORD: &str = "⚠️ Language Mismatch Detected";

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("No audio file provided")]
    NoAudio,
    #[error("{0:#}")]
    Speech(anyhow::Error),
    #[error("conversation store failed: {0:#}")]
    Store(anyhow::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Bytes,
    /// Public URL the saved upload is served under.
    pub audio_url: String,
}

#[derive(Debug, Clone)]
pub enum ProcessInput {
    Text(String),
    Audio(AudioUpload),
}

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub session_id: String,
    pub language: Language,
    pub mode: Mode,
    pub input: ProcessInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    pub total_duration: f64,
    pub words_analyzed: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTurn {
    pub transcription: String,
    pub assessment: AssessmentResult,
    pub feedback: Feedback,
    pub bot_response: String,
    pub translation: Option<String>,
    pub grammar_suggestion: Option<String>,
    pub conversation: Vec<ConversationMessage>,
    pub detailed_analysis: DetailedAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextReply {
    pub success: bool,
    pub conversation: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoSpeech {
    pub error: bool,
    pub no_speech_detected: bool,
    pub user_friendly_message: String,
    pub suggestions: Vec<String>,
    pub conversation: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Completed(Box<CompletedTurn>),
    TextReply(TextReply),
    NoSpeech(NoSpeech),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub error: bool,
    pub message: String,
    pub user_friendly_message: String,
    pub suggestions: Vec<String>,
    pub conversation: Vec<ConversationMessage>,
}

pub struct ConversationHandler {
    store: Arc<dyn ConversationStore>,
    speech: Option<Arc<dyn SpeechAssessor>>,
    tutor: Tutor,
    translation: TranslationService,
}

impl ConversationHandler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        speech: Option<Arc<dyn SpeechAssessor>>,
        tutor: Tutor,
        translation: TranslationService,
    ) -> Self {
        Self {
            store,
            speech,
            tutor,
            translation,
        }
    }

    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessOutcome, HandlerError> {
        let ProcessRequest {
            session_id,
            language,
            mode,
            input,
        } = request;

        match input {
            ProcessInput::Text(text) if !text.trim().is_empty() => {
                self.process_text(&session_id, &language, text).await
            }
            ProcessInput::Text(_) => Err(HandlerError::NoAudio),
            ProcessInput::Audio(upload) => {
                self.process_audio(&session_id, &language, mode, upload)
                    .await
            }
        }
    }

    async fn process_text(
        &self,
        session_id: &str,
        language: &Language,
        text: String,
    ) -> Result<ProcessOutcome, HandlerError> {
        tracing::info!(session_id, %language, "processing text input");

        let history = self.history(session_id).await?;
        let reply = self
            .tutor
            .reply(&text, None, language, &history, Mode::Conversation)
            .await;
        let translation = self.translate_reply(&reply, language).await;

        let user = ConversationMessage::user(text);
        let bot = ConversationMessage::bot(reply).with_translation(translation);
        let conversation = self.append(session_id, language, vec![user, bot]).await?;

        Ok(ProcessOutcome::TextReply(TextReply {
            success: true,
            conversation: conversation.messages,
        }))
    }

    async fn process_audio(
        &self,
        session_id: &str,
        language: &Language,
        mode: Mode,
        upload: AudioUpload,
    ) -> Result<ProcessOutcome, HandlerError> {
        tracing::info!(session_id, %language, %mode, bytes = upload.bytes.len(), "processing audio");

        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| HandlerError::Speech(anyhow!("speech service is not configured")))?;

        let text = match speech
            .transcribe(upload.bytes.clone(), language)
            .await
            .map_err(HandlerError::Speech)?
        {
            Transcription::Recognized { text } => text,
            Transcription::NoSpeech => {
                tracing::info!(session_id, "no speech detected");
                let conversation = self.history(session_id).await?;
                return Ok(ProcessOutcome::NoSpeech(no_speech(language, conversation)));
            }
        };

        let raw = speech
            .assess(upload.bytes, &text, language)
            .await
            .map_err(HandlerError::Speech)?;
        let assessment = scoring::apply(&raw);
        tracing::info!(
            session_id,
            pronunciation = assessment.pronunciation_score,
            accuracy = assessment.accuracy_score,
            fluency = assessment.fluency_score,
            words = assessment.words.len(),
            "assessment scored"
        );

        let feedback = compose(&assessment, language);
        let history = self.history(session_id).await?;
        tracing::debug!(session_id, history = history.len(), "loaded conversation history");

        let bot_response = self
            .tutor
            .reply(&text, Some(&assessment), language, &history, mode)
            .await;
        let translation = self.translate_reply(&bot_response, language).await;
        let qualitative_evaluation = match mode {
            Mode::Feedback => Some(self.tutor.evaluate(&text, &assessment, language).await),
            Mode::Conversation => None,
        };

        let user = ConversationMessage::user(text.clone())
            .with_audio_url(upload.audio_url)
            .with_phonemes(build_word_feedback(&assessment.words, language))
            .with_feedback(MessageFeedback {
                pronunciation_score: assessment.pronunciation_score,
                accuracy_score: assessment.accuracy_score,
                fluency_score: assessment.fluency_score,
                pronunciation: feedback.pronunciation.clone(),
                suggestions: feedback.suggestions.clone(),
                message: feedback.overall.clone(),
                qualitative_evaluation,
            });
        let bot = ConversationMessage::bot(bot_response.clone())
            .with_translation(translation.clone());
        let conversation = self.append(session_id, language, vec![user, bot]).await?;

        let detailed_analysis = DetailedAnalysis {
            total_duration: total_duration_secs(&assessment.words),
            words_analyzed: assessment.words.len(),
            timestamp: Utc::now(),
        };

        Ok(ProcessOutcome::Completed(Box::new(CompletedTurn {
            transcription: text,
            assessment,
            feedback,
            bot_response,
            translation,
            grammar_suggestion: None,
            conversation: conversation.messages,
            detailed_analysis,
        })))
    }

    pub async fn conversation(&self, session_id: &str) -> Result<Option<Conversation>, HandlerError> {
        self.store
            .find_by_session_id(session_id)
            .await
            .map_err(HandlerError::Store)
    }

    pub async fn translate(&self, text: &str) -> String {
        self.translation.translate_to_english(text).await
    }

    /// Failure body for `err`, carrying whatever conversation the session
    /// already has.
    pub async fn failure_response(
        &self,
        session_id: &str,
        language: &Language,
        err: &HandlerError,
    ) -> FailureResponse {
        let conversation = match self.store.find_by_session_id(session_id).await {
            Ok(found) => found.map(|c| c.messages).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "failed to load conversation for error response");
                Vec::new()
            }
        };
        let message = err.to_string();
        FailureResponse {
            error: true,
            user_friendly_message: user_friendly_message(&message, language).to_string(),
            suggestions: error_suggestions(&message, language),
            message,
            conversation,
        }
    }

    async fn history(&self, session_id: &str) -> Result<Vec<ConversationMessage>, HandlerError> {
        Ok(self.conversation(session_id).await?.map(|c| c.messages).unwrap_or_default())
    }

    async fn append(
        &self,
        session_id: &str,
        language: &Language,
        messages: Vec<ConversationMessage>,
    ) -> Result<Conversation, HandlerError> {
        self.store
            .upsert_append(session_id, ConversationDefaults::new(language.clone()), messages)
            .await
            .map_err(HandlerError::Store)
    }

    async fn translate_reply(&self, reply: &str, language: &Language) -> Option<String> {
        if language.is_mandarin() {
            Some(self.translation.translate_to_english(reply).await)
        } else {
            None
        }
    }
}

/// True when there are words but none has an assessed phoneme.
pub fn is_language_mismatch(words: &[Word]) -> bool {
    !words.is_empty() && words.iter().all(|w| w.assessed_scores().next().is_none())
}

/// Per-word analysis tree for the user message. A language mismatch
/// collapses into one placeholder entry.
pub fn build_word_feedback(words: &[Word], language: &Language) -> Vec<WordFeedback> {
    if is_language_mismatch(words) {
        let detected = if language.is_mandarin() {
            "English detected in Chinese mode"
        } else {
            "Chinese detected in English mode"
        };
        return vec![WordFeedback {
            word: LANGUAGE_MISMATCH_WORD.to_string(),
            offset: 0,
            duration: 0,
            word_score: 0,
            original_word_score: 0.0,
            error_type: ErrorType::WrongLanguage,
            phonemes: Vec::new(),
            problem_phonemes: Vec::new(),
            tips: Vec::new(),
            detected_language: Some(detected.to_string()),
        }];
    }
    words.iter().map(|word| annotate_word(word, language)).collect()
}

fn no_speech(language: &Language, conversation: Vec<ConversationMessage>) -> NoSpeech {
    let (message, suggestions): (&str, [&str; 4]) = if language.is_mandarin() {
        (
            "没有检测到语音。请再试一次，说得更清楚一些。",
            [
                "靠近麦克风说话",
                "确保环境安静",
                "说话要清楚、声音要大一些",
                "尝试说\"你好\"或\"谢谢\"",
            ],
        )
    } else {
        (
            "No speech detected. Please try again and speak more clearly.",
            [
                "Speak closer to the microphone",
                "Reduce background noise",
                "Speak louder and more clearly",
                "Try saying \"Hello\" or \"Thank you\"",
            ],
        )
    };
    NoSpeech {
        error: true,
        no_speech_detected: true,
        user_friendly_message: message.to_string(),
        suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        conversation,
    }
}

fn is_unrecognized(lower: &str) -> bool {
    lower.contains("not recognized") || lower.contains("no match")
}

pub fn user_friendly_message(error_message: &str, language: &Language) -> &'static str {
    let lower = error_message.to_lowercase();
    if is_unrecognized(&lower) {
        if language.is_mandarin() {
            "抱歉，我没有听清楚你说的话。请再试一次，说得更清楚一些。"
        } else {
            "Sorry, I couldn't understand what you said. Please try again and speak more clearly."
        }
    } else if lower.contains("subscription") || lower.contains("authentication") {
        "There's an issue with the Azure Speech API credentials. Please check the backend configuration."
    } else if lower.contains("timeout") || lower.contains("timed out") {
        "The request took too long. Please try recording a shorter phrase."
    } else {
        "An error occurred while processing your audio. Please try again."
    }
}

pub fn error_suggestions(error_message: &str, language: &Language) -> Vec<String> {
    if !is_unrecognized(&error_message.to_lowercase()) {
        return Vec::new();
    }
    let tips: [&str; 4] = if language.is_mandarin() {
        [
            "说话时靠近麦克风 (Speak closer to the microphone)",
            "确保周围环境安静 (Make sure it's quiet around you)",
            "说得慢一些、清楚一些 (Speak slower and more clearly)",
            "尝试说简单的词语，如\"你好\"或\"谢谢\" (Try simple words like \"你好\" or \"谢谢\")",
        ]
    } else {
        [
            "Speak closer to your microphone",
            "Reduce background noise",
            "Speak slower and enunciate clearly",
            "Try simple phrases like \"Hello\" or \"How are you?\"",
        ]
    };
    tips.iter().map(|s| s.to_string()).collect()
}
