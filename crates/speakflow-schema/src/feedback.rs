use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ErrorType, NBestPhoneme};

/// How hard a sound is for non-native speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    VeryHard,
}

impl Difficulty {
    pub fn is_hard(self) -> bool {
        matches!(self, Self::Hard | Self::VeryHard)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::VeryHard => "very hard",
        };
        f.write_str(label)
    }
}

/// Articulation guidance for an expected sound, copied out of the guide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedSound {
    pub name: String,
    pub common_mistakes: Vec<String>,
    pub tip: String,
    pub difficulty: Difficulty,
    pub similar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeAnalysis {
    pub phoneme: String,
    pub score: f64,
    pub expected_sound: Option<ExpectedSound>,
    /// Top N-best guess, or `"unclear"` when the provider offered none.
    pub what_you_said: String,
    pub feedback: Vec<String>,
    pub specific_tips: Vec<String>,
    pub is_common_mistake: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemPhoneme {
    pub phoneme: String,
    pub score: f64,
    pub what_said: String,
    pub is_common: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeDetail {
    pub phoneme: String,
    pub score: f64,
    pub offset: u64,
    pub duration: u64,
    pub nbest: Vec<NBestPhoneme>,
    pub analysis: Option<PhonemeAnalysis>,
}

/// Per-word analysis tree embedded in a persisted user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordFeedback {
    pub word: String,
    pub offset: u64,
    pub duration: u64,
    /// Rounded mean of the word's assessed phoneme scores.
    pub word_score: u32,
    /// Score the provider reported for the word, kept for reference.
    pub original_word_score: f64,
    pub error_type: ErrorType,
    pub phonemes: Vec<PhonemeDetail>,
    pub problem_phonemes: Vec<ProblemPhoneme>,
    pub tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeIssue {
    pub phoneme: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedWord {
    pub word: String,
    pub score: u32,
    pub issues: Vec<PhonemeIssue>,
}

/// Quantitative feedback for one utterance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall: String,
    pub encouragement: String,
    pub pronunciation: Vec<FlaggedWord>,
    pub suggestions: Vec<String>,
}

/// Feedback block stored on a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFeedback {
    pub pronunciation_score: f64,
    pub accuracy_score: f64,
    pub fluency_score: f64,
    pub pronunciation: Vec<FlaggedWord>,
    pub suggestions: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub qualitative_evaluation: Option<String>,
}
