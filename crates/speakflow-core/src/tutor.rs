//! LLM tutor replies and qualitative evaluation, with offline fallbacks.

use std::sync::Arc;

use speakflow_provider::{LlmProvider, LlmRequest};
use speakflow_schema::{AssessmentResult, ConversationMessage, Language, Mode, Role};

use crate::responder::CannedResponder;
use crate::scoring::round_score;

pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const HISTORY_WINDOW: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct TutorSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub evaluation_max_tokens: u32,
    pub evaluation_temperature: f32,
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 250,
            temperature: 0.9,
            evaluation_max_tokens: 200,
            evaluation_temperature: 0.7,
        }
    }
}

pub struct Tutor {
    llm: Option<Arc<dyn LlmProvider>>,
    settings: TutorSettings,
    responder: CannedResponder,
}

impl Tutor {
    pub fn new(
        llm: Option<Arc<dyn LlmProvider>>,
        settings: TutorSettings,
        responder: CannedResponder,
    ) -> Self {
        Self {
            llm,
            settings,
            responder,
        }
    }

    /// Tutor with no LLM; every reply comes from the fallbacks.
    pub fn offline(responder: CannedResponder) -> Self {
        Self::new(None, TutorSettings::default(), responder)
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// `assessment` is `None` for typed input; scores then render as 0.
    pub async fn reply(
        &self,
        user_text: &str,
        assessment: Option<&AssessmentResult>,
        language: &Language,
        history: &[ConversationMessage],
        mode: Mode,
    ) -> String {
        let Some(llm) = &self.llm else {
            tracing::debug!(%mode, "no llm configured, using fallback reply");
            return self.fallback_reply(user_text, assessment, language, mode);
        };

        let prompt = build_prompt(user_text, assessment, language, history, mode);
        let request = LlmRequest::simple(self.settings.model.clone(), None, prompt)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);

        match llm.chat(request).await {
            Ok(resp) if !resp.text.trim().is_empty() => resp.text,
            Ok(_) => {
                tracing::warn!(%mode, "llm returned empty reply, using fallback");
                self.fallback_reply(user_text, assessment, language, mode)
            }
            Err(e) => {
                tracing::warn!(error = %e, %mode, "llm reply failed, using fallback");
                self.fallback_reply(user_text, assessment, language, mode)
            }
        }
    }

    pub fn fallback_reply(
        &self,
        user_text: &str,
        assessment: Option<&AssessmentResult>,
        language: &Language,
        mode: Mode,
    ) -> String {
        match mode {
            Mode::Conversation => conversation_fallback(user_text, language),
            Mode::Feedback => {
                let empty = AssessmentResult::default();
                self.responder
                    .respond(user_text, assessment.unwrap_or(&empty), language)
            }
        }
    }

    /// Two to three sentence evaluation of an attempt.
    pub async fn evaluate(
        &self,
        user_text: &str,
        assessment: &AssessmentResult,
        language: &Language,
    ) -> String {
        let Some(llm) = &self.llm else {
            return basic_evaluation(assessment.pronunciation_score).to_string();
        };

        let prompt = build_evaluation_prompt(user_text, assessment, language);
        let request = LlmRequest::simple(self.settings.model.clone(), None, prompt)
            .with_max_tokens(self.settings.evaluation_max_tokens)
            .with_temperature(self.settings.evaluation_temperature);

        match llm.chat(request).await {
            Ok(resp) if !resp.text.trim().is_empty() => resp.text,
            Ok(_) => basic_evaluation(assessment.pronunciation_score).to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "llm evaluation failed, using basic evaluation");
                basic_evaluation(assessment.pronunciation_score).to_string()
            }
        }
    }
}

pub fn basic_evaluation(score: f64) -> &'static str {
    if score >= 85.0 {
        "Strong pronunciation with clear articulation. Maintain consistency across all sounds."
    } else if score >= 70.0 {
        "Good foundation. Focus on problematic phonemes and practice those specific sounds daily."
    } else {
        "Keep practicing! Record yourself and compare with native speakers. Slow, clear repetition helps."
    }
}

/// Keyword heuristics for conversation mode when no LLM is available.
pub fn conversation_fallback(user_text: &str, language: &Language) -> String {
    let lower = user_text.to_lowercase();
    let zh = language.is_mandarin();
    if lower.contains("help") || lower.contains('?') {
        if zh {
            "当然可以帮你！你需要什么具体的帮助？继续练习中文！加油！".to_string()
        } else {
            "I'd love to help! Could you tell me more about what you need? Your pronunciation is getting better!".to_string()
        }
    } else if lower.contains("like") || lower.contains("love") {
        if zh {
            "很有意思！告诉我更多 - 你还喜欢什么？".to_string()
        } else {
            "That sounds great! What else do you enjoy doing?".to_string()
        }
    } else if zh {
        "有意思！告诉我更多关于这个的事情。你能详细说说吗？".to_string()
    } else {
        format!("Interesting! Can you tell me more about \"{user_text}\"?")
    }
}

struct PromptScores {
    pronunciation: u32,
    accuracy: u32,
    fluency: u32,
}

impl PromptScores {
    fn from_assessment(assessment: Option<&AssessmentResult>) -> Self {
        match assessment {
            Some(a) => Self {
                pronunciation: round_score(a.pronunciation_score),
                accuracy: round_score(a.accuracy_score),
                fluency: round_score(a.fluency_score),
            },
            None => Self {
                pronunciation: 0,
                accuracy: 0,
                fluency: 0,
            },
        }
    }
}

fn history_context(history: &[ConversationMessage]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut out = String::from("\n\nCONVERSATION HISTORY (remember this context):");
    for msg in &history[start..] {
        let speaker = match msg.role {
            Role::User => "Student",
            Role::Bot => "You (AI Tutor)",
        };
        out.push_str(&format!("\n{speaker}: \"{}\"", msg.text));
    }
    out.push_str("\n\nUse this history to maintain context and build on previous topics.");
    out
}

pub fn build_prompt(
    user_text: &str,
    assessment: Option<&AssessmentResult>,
    language: &Language,
    history: &[ConversationMessage],
    mode: Mode,
) -> String {
    let scores = PromptScores::from_assessment(assessment);
    let history = history_context(history);
    match mode {
        Mode::Conversation => conversation_prompt(user_text, &scores, &history),
        Mode::Feedback => feedback_prompt(user_text, &scores, &history, language),
    }
}

fn conversation_prompt(user_text: &str, scores: &PromptScores, history: &str) -> String {
    format!(
        r#"You are a Chinese language tutor providing feedback and having conversations ONLY in Mandarin Chinese.

The student is learning Chinese and just said: "{user_text}"

Pronunciation metrics:
- Overall pronunciation: {pron}%
- Accuracy: {acc}%
- Fluency: {flu}%{history}

CRITICAL INSTRUCTIONS:
1. Respond COMPLETELY in Chinese (汉字) - NO English at all
2. READ conversation history for context
3. BE SPECIFIC about what they said: "{user_text}"
   - If they greeted you, greet them back
   - If they asked a question, answer it
   - If they made a statement, respond to it naturally
4. Provide brief feedback on their pronunciation:
   - Pronunciation quality (发音)
   - Grammar if there are issues (语法)
   - Tone accuracy (声调)
5. Continue the conversation naturally based on what THEY said
6. Keep response under 3 sentences
7. Be encouraging and conversational

Scoring guidelines:
- 85%+: Excellent! Praise them (太棒了！非常好！)
- 70-85%: Good! Note what to improve (不错！注意...)
- 60-70%: OK, needs work (还可以，需要...)
- <60%: Encourage more practice (需要多练习...)

IMPORTANT: Respond directly to what they said ("{user_text}"), don't give generic responses!

Examples:
- Student says: "你好" (greeting)
  Response: "你好！你的发音很清楚。你今天怎么样？"

- Student says: "我喜欢学中文" (statement)
  Response: "说得很好！你为什么喜欢学中文呢？"

- Student asks: "你叫什么名字？" (question)
  Response: "我是你的中文老师。你的发音不错！你叫什么名字？"

Respond in pure Chinese, directly addressing what they said:"#,
        pron = scores.pronunciation,
        acc = scores.accuracy,
        flu = scores.fluency,
    )
}

fn feedback_prompt(
    user_text: &str,
    scores: &PromptScores,
    history: &str,
    language: &Language,
) -> String {
    let zh = language.is_mandarin();
    let subject = if zh { "Mandarin Chinese" } else { "English" };
    let learning = if zh { "Mandarin Chinese (中文)" } else { "English" };
    let focus = if zh {
        "Comment on tone accuracy for Chinese"
    } else {
        "Comment on vowel/consonant clarity"
    };

    let mut guidelines = Vec::new();
    if scores.pronunciation >= 85 {
        guidelines.push("Celebrate their excellent pronunciation!");
    }
    if scores.pronunciation < 60 {
        guidelines.push("Be extra encouraging and suggest specific improvements");
    }
    if scores.fluency < 70 {
        guidelines.push("Suggest speaking more slowly and smoothly");
    }
    if scores.accuracy < 70 {
        guidelines.push("Mention specific pronunciation aspects to work on");
    }
    let guidelines = guidelines
        .iter()
        .map(|g| format!("- {g}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an encouraging, patient language learning tutor specializing in {subject}.

The student just said: "{user_text}"

Language learning: {learning}
Pronunciation score: {pron}%
Accuracy score: {acc}%
Fluency score: {flu}%{history}

Your role in FEEDBACK MODE:
1. Consider the conversation history above for context
2. Provide encouraging, detailed feedback based on pronunciation scores
3. Point out specific strengths and areas for improvement
4. {focus}
5. Keep responses under 3 sentences
6. Be constructive and specific

Guidelines:
{guidelines}

Respond with detailed feedback:"#,
        pron = scores.pronunciation,
        acc = scores.accuracy,
        flu = scores.fluency,
    )
}

fn build_evaluation_prompt(
    user_text: &str,
    assessment: &AssessmentResult,
    language: &Language,
) -> String {
    let scores = PromptScores::from_assessment(Some(assessment));
    let language = if language.is_mandarin() {
        "Mandarin Chinese"
    } else {
        "English"
    };
    format!(
        r#"You are a language learning expert. Evaluate this student's pronunciation attempt:

Student said: "{user_text}"
Language: {language}
Technical scores:
- Pronunciation: {pron}%
- Accuracy: {acc}%
- Fluency: {flu}%

Provide a brief qualitative evaluation (2-3 sentences) covering:
1. What they did well
2. Main area to improve
3. One specific actionable tip

Keep it encouraging and practical."#,
        pron = scores.pronunciation,
        acc = scores.accuracy,
        flu = scores.fluency,
    )
}
