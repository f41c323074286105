//! Offline conversational replies picked from fixed templates.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use speakflow_schema::{AssessmentResult, Language};

use crate::scoring::round_score;

/// Picks one template. `None` only when `options` is empty.
pub fn select_response<'a, R>(options: &'a [String], rng: &mut R) -> Option<&'a str>
where
    R: Rng + ?Sized,
{
    options.choose(rng).map(String::as_str)
}

pub struct CannedResponder {
    rng: Mutex<StdRng>,
}

impl Default for CannedResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl CannedResponder {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Same seed, same sequence of replies.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn respond(&self, user_text: &str, assessment: &AssessmentResult, language: &Language) -> String {
        let options = response_options(user_text, assessment, language);
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        select_response(&options, &mut *rng)
            .map(str::to_string)
            .unwrap_or_default()
    }
}

/// The three templates for the band `assessment.pronunciation_score` falls in.
pub fn response_options(
    user_text: &str,
    assessment: &AssessmentResult,
    language: &Language,
) -> Vec<String> {
    let score = assessment.pronunciation_score;
    let pct = round_score(score);
    let u = user_text;

    if language.is_mandarin() {
        if score >= 90.0 {
            vec![
                format!("完美！\"{u}\" 的发音非常标准。You sound like a native speaker! What else would you like to practice?"),
                format!("太棒了！Your pronunciation of \"{u}\" was excellent ({pct}%). Let's try something more challenging!"),
                format!("真不错！That was perfect. I'm impressed with how you pronounced \"{u}\". Ready for the next phrase?"),
            ]
        } else if score >= 70.0 {
            let hint = mandarin_hint(assessment);
            vec![
                format!("很好！\"{u}\" is pretty good ({pct}%). {hint} Let's practice more!"),
                format!("不错！You're getting better. \"{u}\" was mostly clear. Keep working on those tones!"),
                format!("好！I can understand you clearly. \"{u}\" needs just a bit more work on pronunciation. Try again?"),
            ]
        } else if score >= 50.0 {
            vec![
                format!("I heard you say \"{u}\", but let's work on clarity. The tones need more attention. Try speaking slower!"),
                format!("Good try! \"{u}\" was understandable, but focus on getting each tone right. 加油！"),
                format!("I can see you're trying! For \"{u}\", pay special attention to the tone marks. Practice makes perfect!"),
            ]
        } else {
            vec![
                format!("Let's practice \"{u}\" together. Try breaking it down syllable by syllable. Listen to native speakers first!"),
                format!("Don't worry! Learning Chinese tones is hard. For \"{u}\", let's focus on one character at a time. 慢慢来！"),
                format!("\"{u}\" is tricky! Try recording yourself and comparing with native pronunciation. You'll get there!"),
            ]
        }
    } else if score >= 90.0 {
        vec![
            format!("Excellent! \"{u}\" sounded perfect ({pct}%). Your pronunciation is really improving!"),
            format!("Wow! That was spot on. \"{u}\" was clear and natural. What would you like to practice next?"),
            format!("Perfect pronunciation! \"{u}\" was excellent. You're really getting the hang of this!"),
        ]
    } else if score >= 70.0 {
        let hint = english_hint(assessment);
        vec![
            format!("Good job! \"{u}\" was clear ({pct}%). {hint} Keep it up!"),
            format!("Nice work! I understood \"{u}\" perfectly. Just polish up those vowel sounds a bit more."),
            format!("Well done! \"{u}\" was good. You're making great progress!"),
        ]
    } else if score >= 50.0 {
        vec![
            format!("I got \"{u}\", but let's work on making it clearer. Try emphasizing the stressed syllables more."),
            format!("Good effort on \"{u}\"! Focus on slowing down and enunciating each word clearly."),
            format!("You're on the right track with \"{u}\". Pay attention to the vowel sounds - they're key!"),
        ]
    } else {
        vec![
            format!("Let's practice \"{u}\" step by step. Break it into smaller chunks and repeat after me!"),
            format!("\"{u}\" needs some work, but don't give up! Try listening to how native speakers say it."),
            format!("Keep trying! \"{u}\" is challenging. Record yourself and compare with native pronunciation."),
        ]
    }
}

fn mandarin_hint(assessment: &AssessmentResult) -> &'static str {
    if assessment.accuracy_score < 70.0 {
        "Pay special attention to your tones."
    } else if assessment.fluency_score < 70.0 {
        "Try to speak more smoothly."
    } else {
        "Just minor tweaks needed!"
    }
}

fn english_hint(assessment: &AssessmentResult) -> &'static str {
    if assessment.accuracy_score < 70.0 {
        "Focus on your vowel sounds."
    } else if assessment.fluency_score < 70.0 {
        "Try to speak more naturally."
    } else {
        "Just a little more practice!"
    }
}
