//! Per-phoneme findings and word-level tips.
//!
//! Analysis exists only for Mandarin; for any other language the annotator
//! produces no analyses, no problem phonemes and no tips. Phonemes the
//! provider did not assess (score 0) are skipped.

use serde::Serialize;
use speakflow_schema::{
    Language, Phoneme, PhonemeAnalysis, PhonemeDetail, ProblemPhoneme, Word, WordFeedback,
};

use crate::guide::{self, GuideEntry};
use crate::scoring::{round_score, word_score};

/// Phonemes scoring below this are reported as problems.
pub const PROBLEM_THRESHOLD: f64 = 80.0;

const UNCLEAR: &str = "unclear";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Below 60.
    NeedsPractice,
    /// 60 to 79.
    Developing,
    /// 80 to 94.
    Good,
    /// 95 and above.
    Excellent,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score < 60.0 {
            Self::NeedsPractice
        } else if score < 80.0 {
            Self::Developing
        } else if score < 95.0 {
            Self::Good
        } else {
            Self::Excellent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordAnalysis {
    /// Index-aligned with the word's phonemes.
    pub analyses: Vec<Option<PhonemeAnalysis>>,
    pub problem_phonemes: Vec<ProblemPhoneme>,
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopIssue {
    pub phoneme: String,
    pub count: usize,
    pub avg_score: f64,
    pub is_common: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceAnalysis {
    pub words: Vec<WordFeedback>,
    pub top_issues: Vec<TopIssue>,
    pub total_problems: usize,
}

pub fn analyze_phoneme(phoneme: &Phoneme, language: &Language) -> Option<PhonemeAnalysis> {
    if !language.is_mandarin() {
        return None;
    }
    let score = phoneme.assessed_score()?;
    let symbol = phoneme.symbol.as_str();
    let produced = phoneme.top_alternative();

    let mut analysis = PhonemeAnalysis {
        phoneme: symbol.to_string(),
        score,
        expected_sound: None,
        what_you_said: produced.unwrap_or(UNCLEAR).to_string(),
        feedback: Vec::new(),
        specific_tips: Vec::new(),
        is_common_mistake: false,
    };

    let Some(entry) = guide::lookup(symbol) else {
        if score < PROBLEM_THRESHOLD {
            analysis.feedback.push(format!(
                "The sound \"{symbol}\" needs work ({}%).",
                round_score(score)
            ));
            analysis
                .specific_tips
                .push("Listen to native speakers and repeat this sound slowly.".to_string());
        }
        return Some(analysis);
    };
    analysis.expected_sound = Some(entry.to_expected_sound());

    if let Some(produced) = produced {
        if entry.is_common_mistake(produced) {
            analysis.is_common_mistake = true;
            analysis.feedback.push(format!(
                "❌ You said \"{produced}\" but should say \"{symbol}\". This is a very common mistake!"
            ));
        } else if produced != symbol {
            analysis
                .feedback
                .push(format!("❌ You said \"{produced}\" instead of \"{symbol}\"."));
        }
    }

    push_band_messages(&mut analysis, entry, score);

    if entry.difficulty.is_hard() {
        analysis.specific_tips.push(format!(
            "ℹ️ Note: \"{symbol}\" is a {} sound for non-native speakers. Don't worry if it takes time!",
            entry.difficulty
        ));
    }

    Some(analysis)
}

fn push_band_messages(analysis: &mut PhonemeAnalysis, entry: &GuideEntry, score: f64) {
    let pct = round_score(score);
    let symbol = entry.symbol;
    match Severity::from_score(score) {
        Severity::NeedsPractice => {
            analysis
                .feedback
                .push(format!("⚠️ Score: {pct}% - Needs significant practice"));
            analysis.specific_tips.push(format!("🎯 {}", entry.tip));
            analysis.specific_tips.push(format!("💡 {}", entry.similar));
            analysis.specific_tips.push(format!(
                "Practice this sound in isolation 10 times: \"{symbol}, {symbol}, {symbol}...\""
            ));
        }
        Severity::Developing => {
            analysis
                .feedback
                .push(format!("📊 Score: {pct}% - Getting there!"));
            analysis.specific_tips.push(format!("🎯 {}", entry.tip));
            analysis.specific_tips.push(
                "Practice makes perfect - try repeating this sound slowly.".to_string(),
            );
        }
        Severity::Good => {
            analysis.feedback.push(format!("✓ Score: {pct}% - Good!"));
            analysis
                .specific_tips
                .push("Just a bit more polish needed. You're almost there!".to_string());
        }
        Severity::Excellent => {
            analysis
                .feedback
                .push(format!("✅ Score: {pct}% - Excellent!"));
        }
    }
}

pub fn analyze_word(word: &Word, language: &Language) -> WordAnalysis {
    if !language.is_mandarin() {
        return WordAnalysis {
            analyses: vec![None; word.phonemes.len()],
            ..WordAnalysis::default()
        };
    }

    let analyses: Vec<Option<PhonemeAnalysis>> = word
        .phonemes
        .iter()
        .map(|phoneme| analyze_phoneme(phoneme, language))
        .collect();

    let problem_phonemes: Vec<ProblemPhoneme> = analyses
        .iter()
        .flatten()
        .filter(|analysis| analysis.score < PROBLEM_THRESHOLD)
        .map(|analysis| ProblemPhoneme {
            phoneme: analysis.phoneme.clone(),
            score: analysis.score,
            what_said: analysis.what_you_said.clone(),
            is_common: analysis.is_common_mistake,
        })
        .collect();

    let tips = word_tips(&word.text, &problem_phonemes);
    WordAnalysis {
        analyses,
        problem_phonemes,
        tips,
    }
}

pub fn word_tips(word: &str, problems: &[ProblemPhoneme]) -> Vec<String> {
    let mut tips = Vec::new();
    match problems {
        [] => {
            tips.push(format!("✅ Excellent pronunciation of \"{word}\"!"));
            return tips;
        }
        [only] => tips.push(format!(
            "Focus on the \"{}\" sound in \"{word}\".",
            only.phoneme
        )),
        many => {
            let listed = many
                .iter()
                .map(|p| format!("\"{}\"", p.phoneme))
                .collect::<Vec<_>>()
                .join(", ");
            tips.push(format!("In \"{word}\", focus on: {listed}"));
        }
    }

    if problems.iter().any(|p| guide::is_retroflex(&p.phoneme)) {
        tips.push(
            "💡 Remember: Retroflex sounds (zh, ch, sh, r) need your tongue curled back!"
                .to_string(),
        );
    }
    if problems
        .iter()
        .any(|p| guide::has_rounded_front_vowel(&p.phoneme))
    {
        tips.push("💡 For \"ü\" sounds: Say \"ee\" but round your lips!".to_string());
    }
    tips
}

/// Builds the persisted per-word tree: recalculated score, provider score,
/// per-phoneme details with their analyses, problems and tips.
pub fn annotate_word(word: &Word, language: &Language) -> WordFeedback {
    let WordAnalysis {
        analyses,
        problem_phonemes,
        tips,
    } = analyze_word(word, language);

    let phonemes = word
        .phonemes
        .iter()
        .zip(analyses)
        .map(|(phoneme, analysis)| PhonemeDetail {
            phoneme: phoneme.symbol.clone(),
            score: phoneme.score,
            offset: phoneme.offset,
            duration: phoneme.duration,
            nbest: phoneme.nbest.clone(),
            analysis,
        })
        .collect();

    WordFeedback {
        word: word.text.clone(),
        offset: word.offset,
        duration: word.duration,
        word_score: word_score(word),
        original_word_score: word.accuracy_score,
        error_type: word.error_type,
        phonemes,
        problem_phonemes,
        tips,
        detected_language: None,
    }
}

/// Annotates every word and ranks the three worst problem phonemes across
/// the utterance by mean score. Ties keep first-appearance order.
pub fn analyze_sentence(words: &[Word], language: &Language) -> SentenceAnalysis {
    let annotated: Vec<WordFeedback> = words
        .iter()
        .map(|word| annotate_word(word, language))
        .collect();

    let mut grouped: Vec<(String, usize, f64, bool)> = Vec::new();
    let mut total_problems = 0;
    for problem in annotated.iter().flat_map(|w| &w.problem_phonemes) {
        total_problems += 1;
        match grouped.iter_mut().find(|(p, ..)| *p == problem.phoneme) {
            Some((_, count, total, _)) => {
                *count += 1;
                *total += problem.score;
            }
            None => grouped.push((problem.phoneme.clone(), 1, problem.score, problem.is_common)),
        }
    }

    let mut top_issues: Vec<TopIssue> = grouped
        .into_iter()
        .map(|(phoneme, count, total, is_common)| TopIssue {
            phoneme,
            count,
            avg_score: total / count as f64,
            is_common,
        })
        .collect();
    top_issues.sort_by(|a, b| a.avg_score.total_cmp(&b.avg_score));
    top_issues.truncate(3);

    SentenceAnalysis {
        words: annotated,
        top_issues,
        total_problems,
    }
}
