//! Recomputes word- and utterance-level scores from per-phoneme scores.
//!
//! Only assessed phonemes (score > 0) count. A word with no assessed phonemes
//! is left out of both aggregates entirely.

use serde::{Deserialize, Serialize};
use speakflow_schema::{AssessmentResult, Word, TICKS_PER_SECOND};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateScores {
    /// Word-weighted: mean of each word's own mean.
    pub pronunciation: u32,
    /// Phoneme-weighted: mean of every assessed phoneme.
    pub accuracy: u32,
}

/// Mean of the word's assessed phoneme scores, `None` when nothing was assessed.
pub fn word_mean(word: &Word) -> Option<f64> {
    let (sum, count) = word
        .assessed_scores()
        .fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Rounded [`word_mean`], or 0 for a word with nothing assessed.
pub fn word_score(word: &Word) -> u32 {
    word_mean(word).map(round_score).unwrap_or(0)
}

pub fn aggregate(words: &[Word]) -> AggregateScores {
    let mut word_total = 0.0;
    let mut word_count = 0usize;
    let mut phoneme_total = 0.0;
    let mut phoneme_count = 0usize;

    for word in words {
        let Some(mean) = word_mean(word) else {
            continue;
        };
        word_total += mean;
        word_count += 1;
        for score in word.assessed_scores() {
            phoneme_total += score;
            phoneme_count += 1;
        }
    }

    AggregateScores {
        pronunciation: mean_or_zero(word_total, word_count),
        accuracy: mean_or_zero(phoneme_total, phoneme_count),
    }
}

/// Returns a copy of `assessment` whose pronunciation and accuracy scores are
/// replaced by the phoneme-based aggregates. Fluency and the rest are kept.
pub fn apply(assessment: &AssessmentResult) -> AssessmentResult {
    let scores = aggregate(&assessment.words);
    AssessmentResult {
        pronunciation_score: f64::from(scores.pronunciation),
        accuracy_score: f64::from(scores.accuracy),
        ..assessment.clone()
    }
}

/// End of the last word in seconds.
pub fn total_duration_secs(words: &[Word]) -> f64 {
    words
        .last()
        .map(|word| word.end_ticks() as f64 / TICKS_PER_SECOND)
        .unwrap_or(0.0)
}

pub(crate) fn round_score(score: f64) -> u32 {
    score.clamp(0.0, 100.0).round() as u32
}

fn mean_or_zero(total: f64, count: usize) -> u32 {
    if count == 0 {
        0
    } else {
        round_score(total / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speakflow_schema::Phoneme;

    fn word(text: &str, scores: &[f64]) -> Word {
        let phonemes = scores
            .iter()
            .enumerate()
            .map(|(i, score)| Phoneme::new(format!("p{i}"), *score))
            .collect();
        Word::new(text, 0.0, phonemes)
    }

    #[test]
    fn all_zero_phonemes_aggregate_to_zero() {
        let words = vec![word("a", &[0.0, 0.0]), word("b", &[0.0])];
        assert_eq!(aggregate(&words), AggregateScores::default());
    }

    #[test]
    fn empty_word_list_aggregates_to_zero() {
        assert_eq!(aggregate(&[]), AggregateScores::default());
    }

    #[test]
    fn zero_scores_are_excluded_from_word_mean() {
        let w = word("a", &[80.0, 90.0, 0.0, 100.0]);
        assert_eq!(word_mean(&w), Some(90.0));
        assert_eq!(word_score(&w), 90);
    }

    #[test]
    fn word_without_phonemes_scores_zero() {
        assert_eq!(word_score(&word("a", &[])), 0);
        assert_eq!(word_mean(&word("a", &[0.0])), None);
    }

    #[test]
    fn pronunciation_is_word_weighted_and_accuracy_phoneme_weighted() {
        let words = vec![word("a", &[100.0]), word("b", &[50.0, 50.0, 50.0])];
        let scores = aggregate(&words);
        assert_eq!(scores.pronunciation, 75);
        assert_eq!(scores.accuracy, 63);
        assert_ne!(scores.pronunciation, scores.accuracy);
    }

    #[test]
    fn unassessed_words_do_not_drag_aggregates_down() {
        let words = vec![word("a", &[80.0]), word("b", &[0.0, 0.0])];
        let scores = aggregate(&words);
        assert_eq!(scores.pronunciation, 80);
        assert_eq!(scores.accuracy, 80);
    }

    #[test]
    fn apply_overrides_pronunciation_and_accuracy_only() {
        let assessment = AssessmentResult {
            pronunciation_score: 10.0,
            accuracy_score: 10.0,
            fluency_score: 42.0,
            completeness_score: 100.0,
            prosody_score: Some(55.0),
            words: vec![word("a", &[70.0, 90.0])],
        };
        let applied = apply(&assessment);
        assert_eq!(applied.pronunciation_score, 80.0);
        assert_eq!(applied.accuracy_score, 80.0);
        assert_eq!(applied.fluency_score, 42.0);
        assert_eq!(applied.prosody_score, Some(55.0));
        assert_eq!(applied.words, assessment.words);
    }

    #[test]
    fn total_duration_uses_last_word_end() {
        let mut first = word("a", &[]);
        first.offset = 0;
        first.duration = 5_000_000;
        let mut last = word("b", &[]);
        last.offset = 10_000_000;
        last.duration = 15_000_000;
        assert_eq!(total_duration_secs(&[first, last]), 2.5);
        assert_eq!(total_duration_secs(&[]), 0.0);
    }
}
