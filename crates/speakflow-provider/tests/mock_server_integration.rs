use bytes::Bytes;
use speakflow_provider::{
    AnthropicProvider, AzureSpeechProvider, ElevenLabsProvider, GeminiProvider,
    GoogleTranslateProvider, LlmMessage, LlmProvider, LlmRequest, SpeechAssessor,
    SpeechSynthesizer, Translator,
};
use speakflow_schema::{ErrorType, Language, Transcription};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AZURE_PATH: &str = "/speech/recognition/conversation/cognitiveservices/v1";

fn tutor_request() -> LlmRequest {
    LlmRequest {
        model: "claude-3-5-haiku-20241022".into(),
        system: Some("You are a Mandarin tutor".into()),
        messages: vec![LlmMessage::user("我喜欢学习中文")],
        max_tokens: 250,
        temperature: Some(0.9),
    }
}

fn azure_detailed(status: &str) -> serde_json::Value {
    serde_json::json!({
        "RecognitionStatus": status,
        "DisplayText": "你好。",
        "NBest": [{
            "Display": "你好。",
            "PronunciationAssessment": {
                "AccuracyScore": 80.0,
                "FluencyScore": 64.0,
                "CompletenessScore": 100.0,
                "PronScore": 77.0
            },
            "Words": [{
                "Word": "你",
                "Offset": 100000,
                "Duration": 3000000,
                "PronunciationAssessment": {"AccuracyScore": 80.0, "ErrorType": "None"},
                "Phonemes": [{
                    "Phoneme": "n",
                    "PronunciationAssessment": {
                        "AccuracyScore": 80.0,
                        "NBestPhonemes": [{"Phoneme": "l", "Score": 60.0}]
                    }
                }]
            }]
        }]
    })
}

#[tokio::test]
async fn anthropic_chat_sends_version_and_key_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({"max_tokens": 250})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{"type": "text", "text": "很好！你喜欢学习什么？"}],
            "usage": {"input_tokens": 20, "output_tokens": 9},
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("test-key", server.uri());
    let resp = provider.chat(tutor_request()).await.unwrap();

    assert_eq!(resp.text, "很好！你喜欢学习什么？");
    assert_eq!(resp.input_tokens, Some(20));
    assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
}

#[tokio::test]
async fn anthropic_auth_error_is_not_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("bad-key", server.uri());
    let err = provider.chat(tutor_request()).await.unwrap_err().to_string();

    assert!(err.contains("401"));
    assert!(err.contains("authentication"));
    assert!(err.contains("invalid x-api-key"));
    assert!(!err.contains("[retryable]"));
}

#[tokio::test]
async fn anthropic_server_error_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::new("test-key", server.uri());
    let err = provider.chat(tutor_request()).await.unwrap_err().to_string();

    assert!(err.contains("[retryable]"));
    assert!(err.contains("overloaded_error"));
}

#[tokio::test]
async fn gemini_generate_content_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash-exp:generateContent"))
        .and(query_param("key", "g-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "你好！"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new_with_base("g-key", server.uri());
    let mut request = tutor_request();
    request.model = "gemini-2.0-flash-exp".into();
    let resp = provider.chat(request).await.unwrap();

    assert_eq!(resp.text, "你好！");
    assert_eq!(resp.output_tokens, Some(3));
}

#[tokio::test]
async fn azure_assess_sends_assessment_header_and_parses_words() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(AZURE_PATH))
        .and(query_param("language", "zh-CN"))
        .and(query_param("format", "detailed"))
        .and(header("Ocp-Apim-Subscription-Key", "speech-key"))
        .and(header_exists("Pronunciation-Assessment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(azure_detailed("Success")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AzureSpeechProvider::new_with_base("speech-key", server.uri());
    let result = provider
        .assess(Bytes::from_static(b"RIFF"), "你好", &Language::Mandarin)
        .await
        .unwrap();

    assert_eq!(result.fluency_score, 64.0);
    assert_eq!(result.words.len(), 1);
    assert_eq!(result.words[0].error_type, ErrorType::None);
    assert_eq!(result.words[0].phonemes[0].top_alternative(), Some("l"));
}

#[tokio::test]
async fn azure_transcribe_maps_no_match_to_no_speech() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(AZURE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"RecognitionStatus": "NoMatch"})),
        )
        .mount(&server)
        .await;

    let provider = AzureSpeechProvider::new_with_base("speech-key", server.uri());
    let transcription = provider
        .transcribe(Bytes::from_static(b"RIFF"), &Language::Mandarin)
        .await
        .unwrap();

    assert_eq!(transcription, Transcription::NoSpeech);
}

#[tokio::test]
async fn azure_transcribe_returns_display_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(AZURE_PATH))
        .and(query_param("language", "en-US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(azure_detailed("Success")))
        .mount(&server)
        .await;

    let provider = AzureSpeechProvider::new_with_base("speech-key", server.uri());
    let transcription = provider
        .transcribe(Bytes::from_static(b"RIFF"), &Language::English)
        .await
        .unwrap();

    assert_eq!(
        transcription,
        Transcription::Recognized {
            text: "你好。".into()
        }
    );
}

#[tokio::test]
async fn azure_subscription_failure_mentions_authentication() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(AZURE_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = AzureSpeechProvider::new_with_base("wrong", server.uri());
    let err = provider
        .assess(Bytes::from_static(b"RIFF"), "你好", &Language::Mandarin)
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("authentication"));
}

#[tokio::test]
async fn elevenlabs_returns_audio_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/IKne3meq5aSn9XLyUdCD"))
        .and(header("xi-api-key", "tts-key"))
        .and(header("accept", "audio/mpeg"))
        .and(body_partial_json(serde_json::json!({
            "text": "你好",
            "model_id": "eleven_multilingual_v2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3fake".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ElevenLabsProvider::new_with_base("tts-key", server.uri());
    let audio = provider.synthesize("你好", &Language::Mandarin).await.unwrap();

    assert_eq!(&audio[..], b"ID3fake");
}

#[tokio::test]
async fn elevenlabs_error_detail_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/text-to-speech/IKne3meq5aSn9XLyUdCD"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "detail": {"status": "invalid_text", "message": "text is empty"}
        })))
        .mount(&server)
        .await;

    let provider = ElevenLabsProvider::new_with_base("tts-key", server.uri());
    let err = provider
        .synthesize("", &Language::Mandarin)
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("text is empty"));
}

#[tokio::test]
async fn google_translate_reads_first_translation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/language/translate/v2"))
        .and(query_param("key", "t-key"))
        .and(body_partial_json(serde_json::json!({"source": "zh-CN", "target": "en"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"translations": [{"translatedText": "What do you like to eat?"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleTranslateProvider::new_with_base("t-key", server.uri());
    let text = provider
        .translate("你喜欢吃什么？", "zh-CN", "en")
        .await
        .unwrap();

    assert_eq!(text, "What do you like to eat?");
}

#[tokio::test]
async fn google_translate_empty_translations_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/language/translate/v2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"translations": []}})),
        )
        .mount(&server)
        .await;

    let provider = GoogleTranslateProvider::new_with_base("t-key", server.uri());
    let err = provider
        .translate("你好", "zh-CN", "en")
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("empty translations"));
}
