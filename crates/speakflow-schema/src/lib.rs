pub mod assessment;
pub mod conversation;
pub mod feedback;

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use assessment::*;
pub use conversation::*;
pub use feedback::*;

/// Provider time units per second (100-nanosecond ticks).
pub const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Language a learner is practising, keyed by its BCP-47 tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// `zh-CN`
    #[default]
    Mandarin,
    /// `en-US`
    English,
    Other(String),
}

impl Language {
    pub fn tag(&self) -> &str {
        match self {
            Self::Mandarin => "zh-CN",
            Self::English => "en-US",
            Self::Other(tag) => tag.as_str(),
        }
    }

    pub fn is_mandarin(&self) -> bool {
        matches!(self, Self::Mandarin)
    }
}

impl From<String> for Language {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "zh-CN" => Self::Mandarin,
            "en-US" => Self::English,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for Language {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        match language {
            Language::Other(tag) => tag,
            known => known.tag().to_string(),
        }
    }
}

impl FromStr for Language {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// How the tutor should reply to an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Feedback,
    Conversation,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feedback" => Ok(Self::Feedback),
            "conversation" => Ok(Self::Conversation),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feedback => f.write_str("feedback"),
            Self::Conversation => f.write_str("conversation"),
        }
    }
}
