use std::path::Path as StdPath;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use speakflow_core::guide::{self, GuideEntry, ToneEntry};
use speakflow_core::{AudioUpload, HandlerError, ProcessInput, ProcessRequest};
use speakflow_schema::{Language, Mode};

use crate::state::AppState;

const AUDIO_EXTENSIONS: [&str; 4] = ["wav", "mp3", "webm", "ogg"];
/// Upload cap for `/process`, above axum's 2 MB default.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/process",
            post(process).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/conversation/{session_id}", get(get_conversation))
        .route("/translate", post(translate))
        .route("/guide", get(get_guide))
        .route("/tts/generate", post(generate_tts))
        .route("/tts/status", get(tts_status))
}

struct AudioField {
    file_name: String,
    content_type: Option<String>,
    bytes: Bytes,
}

#[derive(Default)]
struct ProcessForm {
    session_id: Option<String>,
    language: Option<String>,
    mode: Option<String>,
    is_text_input: bool,
    text: Option<String>,
    audio: Option<AudioField>,
}

async fn read_process_form(mut multipart: Multipart) -> Result<ProcessForm, MultipartError> {
    let mut form = ProcessForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.audio = Some(AudioField {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "sessionId" => form.session_id = Some(field.text().await?),
            "language" => form.language = Some(field.text().await?),
            "mode" => form.mode = Some(field.text().await?),
            "isTextInput" => form.is_text_input = field.text().await?.trim() == "true",
            "text" => form.text = Some(field.text().await?),
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }
    Ok(form)
}

/// Lowercased extension when both the file name and the MIME type name an
/// accepted audio format. Without a declared type the MIME is guessed from
/// the file name.
pub(crate) fn audio_extension(file_name: &str, content_type: Option<&str>) -> Option<String> {
    let ext = StdPath::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_lowercase();
    if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    let mime = match content_type {
        Some(declared) => declared.to_lowercase(),
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    };
    let mime_ok = mime.contains("mpeg") || AUDIO_EXTENSIONS.iter().any(|t| mime.contains(t));
    mime_ok.then_some(ext)
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn status_for(err: &HandlerError) -> StatusCode {
    match err {
        HandlerError::NoAudio => StatusCode::BAD_REQUEST,
        HandlerError::Speech(_) => StatusCode::BAD_GATEWAY,
        HandlerError::Store(_) | HandlerError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn save_upload(state: &AppState, ext: &str, bytes: &Bytes) -> std::io::Result<String> {
    let file_name = format!("audio-{}.{ext}", chrono::Utc::now().timestamp_millis());
    tokio::fs::create_dir_all(&state.uploads_dir).await?;
    tokio::fs::write(state.uploads_dir.join(&file_name), bytes).await?;
    Ok(format!("/uploads/{file_name}"))
}

async fn process(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_process_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "invalid multipart body");
            return error_body(e.status(), &e.body_text());
        }
    };

    let Some(session_id) = form.session_id.filter(|id| !id.trim().is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, "sessionId is required");
    };
    let language = form.language.map(Language::from).unwrap_or_default();
    let mode = match form.mode.as_deref() {
        None => Mode::default(),
        Some(raw) => raw.parse::<Mode>().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unknown mode, using feedback");
            Mode::Feedback
        }),
    };

    let text = form.text.filter(|t| !t.trim().is_empty());
    let input = match (form.is_text_input, text, form.audio) {
        (true, Some(text), _) => ProcessInput::Text(text),
        (_, _, Some(audio)) => {
            let Some(ext) = audio_extension(&audio.file_name, audio.content_type.as_deref())
            else {
                return error_body(StatusCode::BAD_REQUEST, "Only audio files allowed");
            };
            let audio_url = match save_upload(&state, &ext, &audio.bytes).await {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(error = %e, "failed to save upload");
                    return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save audio");
                }
            };
            ProcessInput::Audio(AudioUpload {
                bytes: audio.bytes,
                audio_url,
            })
        }
        // Empty text, no file: the handler rejects this as missing audio.
        _ => ProcessInput::Text(String::new()),
    };

    let request = ProcessRequest {
        session_id: session_id.clone(),
        language: language.clone(),
        mode,
        input,
    };

    match state.handler.process(request).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => {
            tracing::error!(session_id = %session_id, error = %err, "request failed");
            let body = state
                .handler
                .failure_response(&session_id, &language, &err)
                .await;
            (status_for(&err), Json(body)).into_response()
        }
    }
}

async fn get_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.handler.conversation(&session_id).await {
        Ok(Some(conversation)) => Json(conversation).into_response(),
        Ok(None) => Json(json!({ "messages": [] })).into_response(),
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "failed to fetch conversation");
            error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch conversation",
            )
        }
    }
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: Option<String>,
}

async fn translate(State(state): State<AppState>, Json(req): Json<TranslateRequest>) -> Response {
    let Some(text) = req.text.filter(|t| !t.trim().is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, "No text provided");
    };
    let translation = state.handler.translate(&text).await;
    Json(json!({ "translation": translation })).into_response()
}

#[derive(Serialize)]
pub struct GuideResponse {
    pub phonemes: &'static [GuideEntry],
    pub tones: &'static [ToneEntry],
}

async fn get_guide() -> Json<GuideResponse> {
    Json(GuideResponse {
        phonemes: guide::entries(),
        tones: guide::tones(),
    })
}

#[derive(Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    pub success: bool,
    pub audio_url: String,
}

async fn generate_tts(State(state): State<AppState>, Json(req): Json<TtsRequest>) -> Response {
    let Some(synthesizer) = &state.synthesizer else {
        return error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "Text-to-speech is not configured",
        );
    };
    if req.text.trim().is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "No text provided");
    }
    let language = req.language.map(Language::from).unwrap_or_default();

    let audio = match synthesizer.synthesize(&req.text, &language).await {
        Ok(audio) => audio,
        Err(e) => {
            tracing::error!(error = %e, "speech synthesis failed");
            return error_body(StatusCode::BAD_GATEWAY, "Failed to generate speech");
        }
    };

    let file_name = format!("tts_{}.mp3", chrono::Utc::now().timestamp_millis());
    let written = async {
        tokio::fs::create_dir_all(&state.uploads_dir).await?;
        tokio::fs::write(state.uploads_dir.join(&file_name), &audio).await
    }
    .await;
    if let Err(e) = written {
        tracing::error!(error = %e, "failed to save synthesized audio");
        return error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save audio");
    }

    tracing::info!(%language, bytes = audio.len(), file = %file_name, "generated speech");
    Json(TtsResponse {
        success: true,
        audio_url: format!("/uploads/{file_name}"),
    })
    .into_response()
}

async fn tts_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "enabled": state.synthesizer.is_some() }))
}
