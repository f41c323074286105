use std::cmp::Reverse;
use std::sync::Arc;

use speakflow_provider::Translator;

pub const TRANSLATION_UNAVAILABLE: &str = "[Translation unavailable]";

/// Common tutor phrases. Order matters only among phrases of equal length.
static PHRASES: &[(&str, &str)] = &[
    ("我喜欢学习中文", "I like learning Chinese"),
    ("我喜欢学习", "I like studying"),
    ("学习中文", "Learn Chinese"),
    ("说中文", "Speak Chinese"),
    ("你的发音很好", "Your pronunciation is good"),
    ("你的发音需要改进", "Your pronunciation needs improvement"),
    ("非常好！你的发音很好", "Excellent! Your pronunciation is very good"),
    // greetings
    ("你好", "Hello"),
    ("您好", "Hello (formal)"),
    ("早上好", "Good morning"),
    ("晚上好", "Good evening"),
    ("下午好", "Good afternoon"),
    ("晚安", "Good night"),
    ("再见", "Goodbye"),
    ("拜拜", "Bye bye"),
    // questions
    ("你好吗", "How are you"),
    ("你好吗？", "How are you?"),
    ("你叫什么名字", "What is your name"),
    ("你叫什么名字？", "What is your name?"),
    // responses
    ("谢谢", "Thank you"),
    ("谢谢你", "Thank you"),
    ("不客气", "You are welcome"),
    ("对不起", "Sorry"),
    ("没关系", "It's okay"),
    ("是的", "Yes"),
    ("不是", "No"),
    ("好的", "Okay"),
    ("好", "Good"),
    // feedback
    ("很好", "Very good"),
    ("非常好", "Excellent"),
    ("太棒了", "Excellent"),
    ("不错", "Not bad"),
    ("加油", "Keep it up"),
    ("继续练习", "Keep practicing"),
    ("说得很好", "You spoke very well"),
    ("注意声调", "Pay attention to tones"),
    ("多练习", "Practice more"),
    ("发音", "Pronunciation"),
    ("声调", "Tone"),
    ("练习", "Practice"),
    ("完美", "Perfect"),
    ("优秀", "Excellent"),
];

const FULL_WIDTH_PUNCTUATION: [(&str, &str); 4] =
    [("，", ", "), ("。", ". "), ("？", "?"), ("！", "!")];

/// Phrase-table translation. Exact match first, then longest-phrase-first
/// substitution. `None` when no phrase occurs in `text`.
pub fn rule_based(text: &str) -> Option<String> {
    if let Some((_, english)) = PHRASES.iter().find(|(zh, _)| *zh == text) {
        return Some(english.to_string());
    }

    let mut phrases: Vec<&(&str, &str)> = PHRASES.iter().collect();
    phrases.sort_by_key(|(zh, _)| Reverse(zh.chars().count()));

    let mut result = text.to_string();
    let mut matched = false;
    for (zh, english) in phrases {
        if result.contains(zh) {
            result = result.replace(zh, english);
            matched = true;
        }
    }
    if !matched {
        return None;
    }

    for (from, to) in FULL_WIDTH_PUNCTUATION {
        result = result.replace(from, to);
    }
    Some(result.trim_end().to_string())
}

/// Chinese-to-English translation of tutor replies.
#[derive(Clone, Default)]
pub struct TranslationService {
    translator: Option<Arc<dyn Translator>>,
}

impl TranslationService {
    pub fn new(translator: Option<Arc<dyn Translator>>) -> Self {
        Self { translator }
    }

    pub async fn translate_to_english(&self, text: &str) -> String {
        if let Some(translated) = rule_based(text) {
            tracing::debug!(text, translated = %translated, "rule-based translation");
            return translated;
        }

        let Some(translator) = &self.translator else {
            return TRANSLATION_UNAVAILABLE.to_string();
        };
        match translator.translate(text, "zh-CN", "en").await {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(error = %e, "translation provider failed");
                TRANSLATION_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    struct FixedTranslator(Result<String, String>);

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(&self, _text: &str, _from: &str, _to: &str) -> Result<String> {
            self.0.clone().map_err(|e| anyhow!(e))
        }
    }

    #[test]
    fn exact_match_wins() {
        assert_eq!(rule_based("你好吗？").as_deref(), Some("How are you?"));
        assert_eq!(
            rule_based("非常好！你的发音很好").as_deref(),
            Some("Excellent! Your pronunciation is very good")
        );
    }

    #[test]
    fn longest_phrase_is_substituted_first() {
        assert_eq!(rule_based("你好，谢谢你。").as_deref(), Some("Hello, Thank you."));
        assert_eq!(
            rule_based("我喜欢学习中文！").as_deref(),
            Some("I like learning Chinese!")
        );
    }

    #[test]
    fn unknown_text_is_none() {
        assert!(rule_based("今天天气怎么样").is_none());
    }

    #[tokio::test]
    async fn provider_used_only_when_table_misses() {
        let service = TranslationService::new(Some(Arc::new(FixedTranslator(Ok(
            "How is the weather today".into(),
        )))));
        assert_eq!(
            service.translate_to_english("今天天气怎么样").await,
            "How is the weather today"
        );
        assert_eq!(service.translate_to_english("再见").await, "Goodbye");
    }

    #[tokio::test]
    async fn provider_failure_is_unavailable() {
        let service = TranslationService::new(Some(Arc::new(FixedTranslator(Err("boom".into())))));
        assert_eq!(
            service.translate_to_english("今天天气怎么样").await,
            TRANSLATION_UNAVAILABLE
        );
        assert_eq!(
            TranslationService::default()
                .translate_to_english("今天天气怎么样")
                .await,
            TRANSLATION_UNAVAILABLE
        );
    }
}
