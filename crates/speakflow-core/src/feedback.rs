//! Turns scored assessments into overall messages, flagged words and suggestions.

use speakflow_schema::{AssessmentResult, Feedback, FlaggedWord, Language, PhonemeIssue};

use crate::scoring::round_score;

/// Words whose provider score is below this are flagged.
pub const WORD_FLAG_THRESHOLD: f64 = 70.0;
/// Phonemes inside a flagged word scoring below this are listed as issues.
/// Unassessed (zero) phonemes are listed too; they only stay out of means.
pub const PHONEME_ISSUE_THRESHOLD: f64 = 60.0;

/// Composes feedback for an assessment whose pronunciation and accuracy
/// scores already hold the phoneme-based aggregates.
pub fn compose(assessment: &AssessmentResult, language: &Language) -> Feedback {
    let (overall, encouragement) = overall_message(assessment.pronunciation_score, language);
    let pronunciation = flag_words(assessment);
    let suggestions = suggestions(assessment, language, !pronunciation.is_empty());

    Feedback {
        overall: overall.to_string(),
        encouragement: encouragement.to_string(),
        pronunciation,
        suggestions,
    }
}

pub fn overall_message(score: f64, language: &Language) -> (&'static str, &'static str) {
    if score >= 80.0 {
        let overall = if language.is_mandarin() {
            "非常好！Your pronunciation is excellent!"
        } else {
            "Excellent pronunciation!"
        };
        (overall, "Keep up the great work! 加油！")
    } else if score >= 60.0 {
        (
            "Good effort! Some areas need improvement.",
            "Practice makes perfect!",
        )
    } else {
        (
            "Let's work on your pronunciation together.",
            "Don't worry, you're learning!",
        )
    }
}

fn flag_words(assessment: &AssessmentResult) -> Vec<FlaggedWord> {
    assessment
        .words
        .iter()
        .filter(|word| word.accuracy_score < WORD_FLAG_THRESHOLD)
        .map(|word| FlaggedWord {
            word: word.text.clone(),
            score: round_score(word.accuracy_score),
            issues: word
                .phonemes
                .iter()
                .filter(|p| p.score < PHONEME_ISSUE_THRESHOLD)
                .map(|p| PhonemeIssue {
                    phoneme: p.symbol.clone(),
                    score: round_score(p.score),
                })
                .collect(),
        })
        .collect()
}

fn suggestions(assessment: &AssessmentResult, language: &Language, has_flagged: bool) -> Vec<String> {
    let (slow_down, accuracy, review): (&str, [&str; 2], &str) = if language.is_mandarin() {
        (
            "Speak more slowly and clearly",
            [
                "Focus on tone accuracy (声调)",
                "Practice pitch contours for each tone",
            ],
            "Review problematic characters listed above",
        )
    } else {
        (
            "Try to speak more smoothly",
            [
                "Focus on vowel sounds",
                "Pay attention to consonant endings",
            ],
            "Practice the highlighted words",
        )
    };

    let mut out = Vec::new();
    if assessment.fluency_score < 60.0 {
        out.push(slow_down.to_string());
    }
    if assessment.accuracy_score < 70.0 {
        out.extend(accuracy.iter().map(|s| s.to_string()));
    }
    if has_flagged {
        out.push(review.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use speakflow_schema::{Phoneme, Word};

    fn assessment(pron: f64, accuracy: f64, fluency: f64, words: Vec<Word>) -> AssessmentResult {
        AssessmentResult {
            pronunciation_score: pron,
            accuracy_score: accuracy,
            fluency_score: fluency,
            completeness_score: 100.0,
            prosody_score: None,
            words,
        }
    }

    #[test]
    fn tone_suggestion_only_below_seventy() {
        let low = compose(&assessment(80.0, 65.0, 90.0, vec![]), &Language::Mandarin);
        assert!(low
            .suggestions
            .contains(&"Focus on tone accuracy (声调)".to_string()));

        let ok = compose(&assessment(80.0, 75.0, 90.0, vec![]), &Language::Mandarin);
        assert!(!ok
            .suggestions
            .contains(&"Focus on tone accuracy (声调)".to_string()));
        assert!(ok.suggestions.is_empty());
    }

    #[test]
    fn overall_bands() {
        assert_eq!(
            overall_message(80.0, &Language::Mandarin).0,
            "非常好！Your pronunciation is excellent!"
        );
        assert_eq!(
            overall_message(80.0, &Language::English).0,
            "Excellent pronunciation!"
        );
        assert_eq!(
            overall_message(79.0, &Language::English).0,
            "Good effort! Some areas need improvement."
        );
        assert_eq!(
            overall_message(60.0, &Language::English).1,
            "Practice makes perfect!"
        );
        assert_eq!(
            overall_message(59.0, &Language::Mandarin).0,
            "Let's work on your pronunciation together."
        );
    }

    #[test]
    fn empty_assessment_falls_to_lowest_band() {
        let feedback = compose(&AssessmentResult::default(), &Language::Mandarin);
        assert_eq!(feedback.overall, "Let's work on your pronunciation together.");
        assert!(feedback.pronunciation.is_empty());
        assert_eq!(
            feedback.suggestions,
            vec![
                "Speak more slowly and clearly",
                "Focus on tone accuracy (声调)",
                "Practice pitch contours for each tone",
            ]
        );
    }

    #[test]
    fn flags_low_words_with_low_phoneme_issues() {
        let words = vec![
            Word::new(
                "你",
                62.4,
                vec![
                    Phoneme::new("n", 45.6),
                    Phoneme::new("i", 88.0),
                    Phoneme::new("x", 0.0),
                ],
            ),
            Word::new("好", 90.0, vec![Phoneme::new("h", 20.0)]),
        ];
        let feedback = compose(&assessment(70.0, 72.0, 80.0, words), &Language::English);

        assert_eq!(feedback.pronunciation.len(), 1);
        let flagged = &feedback.pronunciation[0];
        assert_eq!(flagged.word, "你");
        assert_eq!(flagged.score, 62);
        assert_eq!(
            flagged.issues,
            vec![
                PhonemeIssue {
                    phoneme: "n".into(),
                    score: 46
                },
                PhonemeIssue {
                    phoneme: "x".into(),
                    score: 0
                },
            ]
        );
        assert_eq!(feedback.suggestions, vec!["Practice the highlighted words"]);
    }

    #[test]
    fn english_suggestions_are_language_branched() {
        let feedback = compose(&assessment(50.0, 50.0, 50.0, vec![]), &Language::English);
        assert_eq!(
            feedback.suggestions,
            vec![
                "Try to speak more smoothly",
                "Focus on vowel sounds",
                "Pay attention to consonant endings",
            ]
        );
    }

    #[test]
    fn compose_is_deterministic() {
        let a = assessment(
            66.0,
            61.0,
            58.0,
            vec![Word::new("是", 40.0, vec![Phoneme::new("sh", 40.0)])],
        );
        let first = serde_json::to_string(&compose(&a, &Language::Mandarin)).unwrap();
        let second = serde_json::to_string(&compose(&a, &Language::Mandarin)).unwrap();
        assert_eq!(first, second);
    }
}
