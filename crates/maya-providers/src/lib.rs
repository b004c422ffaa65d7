//! Provider clients.
//!
//! Each external capability sits behind a small trait so the pipeline can be
//! driven by fakes in tests: [`SpeechToText`], [`ChatModel`],
//! [`TextToSpeech`], and [`ExtractVisemes`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use maya_core::types::{ReplyMessage, VisemeTrack};

pub mod deepgram;
pub mod elevenlabs;
pub mod groq;
pub mod openai;
pub mod rhubarb;

/// Sentinel transcript returned when a recording could not be transcribed.
pub const UNTRANSCRIBABLE: &str = "Unable to transcribe audio. Please try again.";

/// Request timeout shared by all HTTP providers. Generous, to tolerate
/// large-model latencies.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the shared connection-pooled HTTP client for a provider.
///
/// Providers are called on every turn, so keep-alive reuse matters more than
/// per-call setup cost.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(100)
        .timeout(PROVIDER_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Speech-to-text over one recorded utterance.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Provider identifier (e.g., "deepgram", "groq").
    fn id(&self) -> &str;

    /// Transcribe a recorded clip. `language` is an ISO 639-1 code;
    /// `None` requests auto-detection.
    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> anyhow::Result<String>;
}

/// Text generation for replies, document updates, and extraction.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the bot's reply to the latest transcript given the full
    /// conversation history. The response must follow the strict
    /// `{"messages": [...]}` schema; a violation is an error.
    async fn generate_reply(
        &self,
        user_history: &[String],
        bot_history: &[String],
        transcript: &str,
    ) -> anyhow::Result<Vec<ReplyMessage>>;

    /// Regenerate the persona document from its current state and the new
    /// transcript. Returns the full replacement document.
    async fn update_persona(
        &self,
        persona: &serde_json::Value,
        transcript: &str,
    ) -> anyhow::Result<serde_json::Value>;

    /// Extract form-field updates from one question/answer pair. Returns a
    /// partial dictionary of fields to merge.
    async fn extract_form_fields(
        &self,
        form: &serde_json::Value,
        question: &str,
        answer: &str,
    ) -> anyhow::Result<serde_json::Value>;

    /// Free-text, search-grounded recommendations for a user profile.
    async fn recommendations(&self, profile: &serde_json::Value) -> anyhow::Result<String>;
}

/// Speech synthesis returning raw 16-bit PCM.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> anyhow::Result<Vec<u8>>;
}

/// Mouth-shape timeline extraction from a WAV file.
#[async_trait]
pub trait ExtractVisemes: Send + Sync {
    async fn extract(&self, wav_path: &Path) -> anyhow::Result<VisemeTrack>;
}
