use serde::{Deserialize, Serialize};

/// One candidate in the provider's N-best list for a phoneme slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NBestPhoneme {
    pub phoneme: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phoneme {
    pub symbol: String,
    /// Provider accuracy in [0, 100]. Zero means the phoneme was not assessed.
    pub score: f64,
    pub offset: u64,
    pub duration: u64,
    #[serde(default)]
    pub nbest: Vec<NBestPhoneme>,
}

impl Phoneme {
    pub fn new(symbol: impl Into<String>, score: f64) -> Self {
        Self {
            symbol: symbol.into(),
            score,
            offset: 0,
            duration: 0,
            nbest: Vec::new(),
        }
    }

    pub fn with_nbest(mut self, nbest: Vec<NBestPhoneme>) -> Self {
        self.nbest = nbest;
        self
    }

    /// The score when the provider actually assessed this phoneme.
    pub fn assessed_score(&self) -> Option<f64> {
        (self.score > 0.0).then_some(self.score)
    }

    /// The provider's best guess at what was actually spoken.
    pub fn top_alternative(&self) -> Option<&str> {
        self.nbest.first().map(|candidate| candidate.phoneme.as_str())
    }
}

/// Word-level miscue classification reported by the assessment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorType {
    #[default]
    None,
    Omission,
    Insertion,
    Mispronunciation,
    UnexpectedBreak,
    MissingBreak,
    Monotone,
    WrongLanguage,
}

impl ErrorType {
    /// Maps a provider label onto a known class; unknown labels read as `None`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Omission" => Self::Omission,
            "Insertion" => Self::Insertion,
            "Mispronunciation" => Self::Mispronunciation,
            "UnexpectedBreak" => Self::UnexpectedBreak,
            "MissingBreak" => Self::MissingBreak,
            "Monotone" => Self::Monotone,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub text: String,
    pub offset: u64,
    pub duration: u64,
    #[serde(default)]
    pub error_type: ErrorType,
    pub accuracy_score: f64,
    #[serde(default)]
    pub phonemes: Vec<Phoneme>,
}

impl Word {
    pub fn new(text: impl Into<String>, accuracy_score: f64, phonemes: Vec<Phoneme>) -> Self {
        Self {
            text: text.into(),
            offset: 0,
            duration: 0,
            error_type: ErrorType::None,
            accuracy_score,
            phonemes,
        }
    }

    pub fn assessed_scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.phonemes.iter().filter_map(Phoneme::assessed_score)
    }

    pub fn end_ticks(&self) -> u64 {
        self.offset.saturating_add(self.duration)
    }
}

/// Pronunciation assessment of one utterance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub pronunciation_score: f64,
    pub accuracy_score: f64,
    pub fluency_score: f64,
    pub completeness_score: f64,
    #[serde(default)]
    pub prosody_score: Option<f64>,
    #[serde(default)]
    pub words: Vec<Word>,
}

/// Outcome of a recognition-only pass over an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Transcription {
    Recognized { text: String },
    NoSpeech,
}
