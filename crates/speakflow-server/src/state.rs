use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use speakflow_core::{
    CannedResponder, ConversationHandler, SpeakflowConfig, TranslationService, Tutor,
};
use speakflow_memory::SqliteConversationStore;
use speakflow_provider::SpeechSynthesizer;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<ConversationHandler>,
    /// `None` disables the text-to-speech routes.
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub uploads_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires providers, the conversation store and the handler from config.
    /// Relative paths in `config` are resolved against `root`.
    pub fn from_config(root: &Path, config: &SpeakflowConfig) -> Result<Self> {
        let db_path = root.join(&config.database.path);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data dir: {}", parent.display()))?;
        }
        let db_path_str = db_path
            .to_str()
            .ok_or_else(|| anyhow!("database path is not valid utf-8: {}", db_path.display()))?;
        let store = SqliteConversationStore::open(db_path_str)?;

        let speech = config.speech_assessor();
        if speech.is_none() {
            tracing::warn!("speech key not set, audio requests will fail");
        }

        let tutor = Tutor::new(
            config.llm_provider()?,
            config.tutor_settings(),
            CannedResponder::new(),
        );
        let translation = TranslationService::new(config.translator());
        let handler = ConversationHandler::new(Arc::new(store), speech, tutor, translation);

        Ok(Self {
            handler: Arc::new(handler),
            synthesizer: config.synthesizer(),
            uploads_dir: root.join(&config.server.uploads_dir),
            allowed_origins: config.server.allowed_origins.clone(),
            started_at: Instant::now(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use speakflow_provider::SpeechAssessor;

    pub(crate) fn state(
        root: &Path,
        speech: Option<Arc<dyn SpeechAssessor>>,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> AppState {
        let store = SqliteConversationStore::open_in_memory().unwrap();
        let handler = ConversationHandler::new(
            Arc::new(store),
            speech,
            Tutor::offline(CannedResponder::with_seed(5)),
            TranslationService::default(),
        );
        AppState {
            handler: Arc::new(handler),
            synthesizer,
            uploads_dir: root.join("uploads"),
            allowed_origins: Vec::new(),
            started_at: Instant::now(),
        }
    }
}
