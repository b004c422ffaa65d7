//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use maya_core::config::Config;
use maya_core::session::SessionState;
use maya_documents::{Mailer, PersonaStore, SheetExporter};
use maya_pipeline::{BackgroundTasks, TurnPipeline};
use maya_providers::deepgram::DeepgramClient;
use maya_providers::elevenlabs::ElevenLabsClient;
use maya_providers::groq::GroqWhisperClient;
use maya_providers::openai::OpenAiChat;
use maya_providers::rhubarb::RhubarbExtractor;
use maya_providers::{ChatModel, http_client};

/// Timeout for the background document/form tasks; nothing awaits them, so
/// they carry their own bound.
const BACKGROUND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AppState {
    pub config: Config,
    pub session: Arc<SessionState>,
    pub pipeline: TurnPipeline,
    pub persona: Arc<PersonaStore>,
    pub exporter: Arc<SheetExporter>,
    pub mailer: Option<Mailer>,
    pub chat: Arc<dyn ChatModel>,
    pub background: Arc<BackgroundTasks>,
    /// Client for the reverse-geocoding lookups.
    pub geocoder: reqwest::Client,
}

impl AppState {
    /// Wire up real provider clients from config.
    pub fn from_config(config: Config) -> anyhow::Result<Arc<Self>> {
        let providers = &config.providers;

        let deepgram_key = providers.deepgram.resolve_api_key().unwrap_or_else(|| {
            warn!("Deepgram API key not configured");
            String::new()
        });
        let groq_key = providers.groq.resolve_api_key().unwrap_or_else(|| {
            warn!("Groq API key not configured");
            String::new()
        });
        let openai_key = providers.openai.resolve_api_key().unwrap_or_else(|| {
            warn!("OpenAI API key not configured");
            String::new()
        });
        let elevenlabs_key = providers.elevenlabs.resolve_api_key().unwrap_or_else(|| {
            warn!("ElevenLabs API key not configured");
            String::new()
        });

        let deepgram = Arc::new(DeepgramClient::new(
            deepgram_key,
            providers.deepgram.model.clone(),
            http_client()?,
        ));
        let groq = Arc::new(GroqWhisperClient::new(
            groq_key,
            providers.groq.model.clone(),
            http_client()?,
        ));
        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChat::new(
            openai_key,
            providers.openai.model.clone(),
            providers.openai.search_model.clone(),
            http_client()?,
        ));
        let tts = Arc::new(ElevenLabsClient::new(
            elevenlabs_key,
            providers.elevenlabs.model.clone(),
            http_client()?,
        ));
        let visemes = Arc::new(RhubarbExtractor::new(
            config.viseme.binary.clone(),
            config.viseme.threads,
        ));

        let session = Arc::new(SessionState::new());
        let persona = Arc::new(PersonaStore::new(config.storage.persona_path.clone()));
        let exporter = Arc::new(SheetExporter::new(
            config.storage.sheet_path.clone(),
            config.storage.rows_path.clone(),
        ));
        let mailer = config.smtp.clone().map(Mailer::new);
        let background = Arc::new(BackgroundTasks::new(BACKGROUND_TIMEOUT));

        let pipeline = TurnPipeline::new(
            session.clone(),
            deepgram,
            groq,
            chat.clone(),
            tts,
            visemes,
            persona.clone(),
            config.storage.audio_dir.clone(),
            background.clone(),
        );

        let geocoder = reqwest::Client::builder()
            .user_agent(concat!("maya-backend/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Arc::new(Self {
            config,
            session,
            pipeline,
            persona,
            exporter,
            mailer,
            chat,
            background,
            geocoder,
        }))
    }
}
