use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Language, MessageFeedback, WordFeedback};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonemes: Option<Vec<WordFeedback>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grammar_suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<MessageFeedback>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            audio_url: None,
            phonemes: None,
            translation: None,
            grammar_suggestion: None,
            feedback: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(Role::Bot, text)
    }

    pub fn with_audio_url(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    pub fn with_phonemes(mut self, words: Vec<WordFeedback>) -> Self {
        self.phonemes = Some(words);
        self
    }

    pub fn with_translation(mut self, translation: Option<String>) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_grammar_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.grammar_suggestion = suggestion;
        self
    }

    pub fn with_feedback(mut self, feedback: MessageFeedback) -> Self {
        self.feedback = Some(feedback);
        self
    }
}

/// Message log of one practice session. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub session_id: String,
    pub language: Language,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values used only when a conversation is created by its first write.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDefaults {
    pub language: Language,
    pub created_at: DateTime<Utc>,
}

impl ConversationDefaults {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted_when_empty() {
        let msg = ConversationMessage::user("你好");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["text"], "你好");
        assert!(value.get("audioUrl").is_none());
        assert!(value.get("feedback").is_none());
        assert!(value["timestamp"].as_str().is_some());
    }

    #[test]
    fn builder_sets_bot_extras() {
        let msg = ConversationMessage::bot("你好！")
            .with_translation(Some("Hello!".into()))
            .with_grammar_suggestion(None);
        assert_eq!(msg.role, Role::Bot);
        assert_eq!(msg.translation.as_deref(), Some("Hello!"));
        assert!(msg.grammar_suggestion.is_none());
    }
}
