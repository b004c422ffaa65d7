//! Deepgram prerecorded transcription.
//!
//! Covers the high-accuracy language set. A transport or response-shape
//! failure degrades to the sentinel transcript instead of erroring, so a bad
//! recording never aborts the turn.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{SpeechToText, UNTRANSCRIBABLE};

const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

pub struct DeepgramClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl DeepgramClient {
    pub fn new(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            base_url: DEEPGRAM_BASE_URL.into(),
            api_key,
            model,
            client,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').into();
        self
    }

    fn listen_url(&self, language: Option<&str>) -> String {
        let mut url = format!(
            "{}/v1/listen?model={}&smart_format=true",
            self.base_url, self.model
        );
        match language {
            Some(code) => {
                url.push_str("&language=");
                url.push_str(code);
            }
            None => url.push_str("&detect_language=true"),
        }
        url
    }
}

// --- Deepgram response types ---

#[derive(Debug, Default, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    results: Option<ListenResults>,
}

#[derive(Debug, Default, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Default, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Default, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

impl ListenResponse {
    fn transcript(self) -> Option<String> {
        let alt = self.results?.channels.into_iter().next()?.alternatives.into_iter().next()?;
        Some(alt.transcript)
    }
}

#[async_trait]
impl SpeechToText for DeepgramClient {
    fn id(&self) -> &str {
        "deepgram"
    }

    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> anyhow::Result<String> {
        let url = self.listen_url(language);
        debug!(model = %self.model, ?language, bytes = audio.len(), "Transcribing with Deepgram");

        let result = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                warn!(%e, "Deepgram request failed");
                return Ok(UNTRANSCRIBABLE.into());
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, body, "Deepgram API error");
            return Ok(UNTRANSCRIBABLE.into());
        }

        let parsed: ListenResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%e, "Failed to parse Deepgram response");
                return Ok(UNTRANSCRIBABLE.into());
            }
        };

        match parsed.transcript() {
            Some(transcript) => {
                debug!(chars = transcript.len(), "Deepgram transcription received");
                Ok(transcript)
            }
            None => {
                warn!("Unexpected Deepgram response shape");
                Ok(UNTRANSCRIBABLE.into())
            }
        }
    }
}
