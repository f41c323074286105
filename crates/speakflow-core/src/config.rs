use std::{fs, path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use speakflow_provider::{
    create_provider, AzureSpeechProvider, ElevenLabsProvider, GoogleTranslateProvider,
    LlmProvider, ProviderConfig, ProviderType, SpeechAssessor, SpeechSynthesizer, Translator,
    VoiceSettings,
};

use crate::tutor::{TutorSettings, DEFAULT_MODEL};

fn default_bind() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_uploads_dir() -> String {
    "uploads".to_string()
}

fn default_database_path() -> String {
    "data/speakflow.db".to_string()
}

fn default_llm_provider() -> ProviderType {
    ProviderType::Anthropic
}

fn default_llm_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    250
}

fn default_temperature() -> f32 {
    0.9
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    /// Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            uploads_dir: default_uploads_dir(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub api_key: String,
    pub region: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: ProviderType,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub api_key: String,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub voice: VoiceSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeakflowConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub speech: Option<SpeechConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tts: Option<TtsConfig>,
    #[serde(default)]
    pub translation: Option<TranslationConfig>,
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl SpeakflowConfig {
    pub fn tutor_settings(&self) -> TutorSettings {
        TutorSettings {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            ..TutorSettings::default()
        }
    }

    /// `None` when the provider needs a key and none is set; replies then
    /// come from the offline fallbacks.
    pub fn llm_provider(&self) -> Result<Option<Arc<dyn LlmProvider>>> {
        let key = self.llm.api_key.as_deref().and_then(non_empty);
        if self.llm.provider != ProviderType::Stub && key.is_none() {
            tracing::warn!(
                provider = ?self.llm.provider,
                "llm api key not set, using offline replies"
            );
            return Ok(None);
        }

        let mut config = ProviderConfig::new(self.llm.provider.clone());
        if let Some(key) = key {
            config = config.with_api_key(key);
        }
        if let Some(base_url) = self.llm.base_url.as_deref().and_then(non_empty) {
            config = config.with_base_url(base_url);
        }
        create_provider(&config).map(Some)
    }

    pub fn speech_assessor(&self) -> Option<Arc<dyn SpeechAssessor>> {
        let speech = self.speech.as_ref()?;
        let key = non_empty(&speech.api_key)?;
        let provider = match speech.base_url.as_deref().and_then(non_empty) {
            Some(base) => AzureSpeechProvider::new_with_base(key, base),
            None => AzureSpeechProvider::new(key, speech.region.trim()),
        };
        Some(Arc::new(provider))
    }

    pub fn synthesizer(&self) -> Option<Arc<dyn SpeechSynthesizer>> {
        let tts = self.tts.as_ref()?;
        let key = non_empty(&tts.api_key)?;
        let mut provider = match tts.base_url.as_deref().and_then(non_empty) {
            Some(base) => ElevenLabsProvider::new_with_base(key, base),
            None => ElevenLabsProvider::new(key),
        };
        if let Some(voice) = tts.voice_id.as_deref().and_then(non_empty) {
            provider = provider.with_voice(voice);
        }
        if let Some(model) = tts.model_id.as_deref().and_then(non_empty) {
            provider = provider.with_model(model);
        }
        Some(Arc::new(provider.with_settings(tts.voice.clone())))
    }

    pub fn translator(&self) -> Option<Arc<dyn Translator>> {
        let translation = self.translation.as_ref()?;
        let key = non_empty(&translation.api_key)?;
        let provider = match translation.base_url.as_deref().and_then(non_empty) {
            Some(base) => GoogleTranslateProvider::new_with_base(key, base),
            None => GoogleTranslateProvider::new(key),
        };
        Some(Arc::new(provider))
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Loads `<root>/config/main.yaml`, resolves `${VAR}` placeholders and validates.
pub fn load_config(root: &Path) -> Result<SpeakflowConfig> {
    let mut config: SpeakflowConfig = read_yaml_file(&root.join("config").join("main.yaml"))?;
    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &SpeakflowConfig) -> Result<()> {
    if config.server.bind.trim().is_empty() {
        return Err(anyhow!("server.bind must not be empty"));
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(anyhow!(
            "llm.temperature must be within [0, 2]: {}",
            config.llm.temperature
        ));
    }

    if config.llm.max_tokens == 0 {
        return Err(anyhow!("llm.max_tokens must be greater than 0"));
    }

    if let Some(speech) = &config.speech {
        if speech.region.trim().is_empty() && speech.base_url.is_none() {
            return Err(anyhow!("speech.region must not be empty"));
        }
    }

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_optional(value: &mut Option<String>) {
    if let Some(inner) = value {
        *inner = resolve_env_var(inner);
    }
}

fn resolve_config_env(config: &mut SpeakflowConfig) {
    config.server.bind = resolve_env_var(&config.server.bind);
    config.server.uploads_dir = resolve_env_var(&config.server.uploads_dir);
    for origin in &mut config.server.allowed_origins {
        *origin = resolve_env_var(origin);
    }

    config.database.path = resolve_env_var(&config.database.path);

    if let Some(speech) = &mut config.speech {
        speech.api_key = resolve_env_var(&speech.api_key);
        speech.region = resolve_env_var(&speech.region);
        resolve_optional(&mut speech.base_url);
    }

    config.llm.model = resolve_env_var(&config.llm.model);
    resolve_optional(&mut config.llm.api_key);
    resolve_optional(&mut config.llm.base_url);

    if let Some(tts) = &mut config.tts {
        tts.api_key = resolve_env_var(&tts.api_key);
        resolve_optional(&mut tts.voice_id);
        resolve_optional(&mut tts.model_id);
        resolve_optional(&mut tts.base_url);
    }

    if let Some(translation) = &mut config.translation {
        translation.api_key = resolve_env_var(&translation.api_key);
        resolve_optional(&mut translation.base_url);
    }
}
