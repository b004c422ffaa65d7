//! Groq Whisper transcription — the fallback provider set.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::SpeechToText;

const GROQ_TRANSCRIPTION_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

pub struct GroqWhisperClient {
    url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqWhisperClient {
    pub fn new(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            url: GROQ_TRANSCRIPTION_URL.into(),
            api_key,
            model,
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SpeechToText for GroqWhisperClient {
    fn id(&self) -> &str {
        "groq"
    }

    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> anyhow::Result<String> {
        let file_part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.webm")
            .mime_str("application/octet-stream")?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone());

        if let Some(code) = language {
            form = form.text("language", code.to_string());
        }

        debug!(model = %self.model, ?language, bytes = audio.len(), "Transcribing with Groq");

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Groq transcription API error {status}: {body}");
        }

        let parsed: TranscriptionResponse = resp.json().await?;
        let transcript = parsed.text.trim().to_string();
        debug!(chars = transcript.len(), "Groq transcription received");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id() {
        let client = GroqWhisperClient::new(
            "key".into(),
            "whisper-large-v3".into(),
            reqwest::Client::new(),
        );
        assert_eq!(client.id(), "groq");
        assert_eq!(client.url, GROQ_TRANSCRIPTION_URL);
    }

    #[test]
    fn test_response_parse() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text": "  hello there  "}"#).unwrap();
        assert_eq!(parsed.text.trim(), "hello there");
    }

    #[test]
    fn test_response_missing_text_defaults_empty() {
        let parsed: TranscriptionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.text, "");
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let mut client = GroqWhisperClient::new(
            "key".into(),
            "whisper-large-v3".into(),
            reqwest::Client::new(),
        );
        client.url = "http://127.0.0.1:1/transcriptions".into();
        // Unlike Deepgram, Groq propagates transport failures; the pipeline
        // downgrades them to an empty transcript.
        assert!(client.transcribe(b"bytes", None).await.is_err());
    }
}
