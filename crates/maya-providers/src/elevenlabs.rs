//! ElevenLabs speech synthesis.
//!
//! The streaming endpoint delivers raw PCM in chunks; they are concatenated
//! into one buffer so the pipeline can frame a complete WAV before viseme
//! extraction.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use crate::TextToSpeech;

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Sample rate of the `pcm_44100` output format requested below.
pub const PCM_SAMPLE_RATE: u32 = 44_100;

pub struct ElevenLabsClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            base_url: ELEVENLABS_BASE_URL.into(),
            api_key,
            model,
            client,
        }
    }

    fn stream_url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{voice_id}/stream?output_format=pcm_44100&optimize_streaming_latency=4",
            self.base_url
        )
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> anyhow::Result<Vec<u8>> {
        let url = self.stream_url(voice_id);
        debug!(voice = voice_id, model = %self.model, chars = text.len(), "Starting TTS stream");

        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "text": text,
                "model_id": self.model,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75
                }
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("ElevenLabs API error {status}: {body}");
        }

        let mut pcm = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| anyhow::anyhow!("TTS stream error: {e}"))?;
            pcm.extend_from_slice(&bytes);
        }

        debug!(pcm_bytes = pcm.len(), "TTS stream complete");
        Ok(pcm)
    }
}
