//! The per-utterance orchestrator.
//!
//! One call to [`TurnPipeline::run`] drives a full turn: transcription,
//! reply generation, audio + viseme enrichment, and the two background
//! document updates. Ordering contract:
//!
//! - transcription completes before any state mutation;
//! - reply generation completes before enrichment;
//! - enrichment completes before the messages are returned;
//! - the persona update and the form extraction are never awaited by the
//!   response path and their failures are logged only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use tracing::{debug, error, info, warn};

use maya_core::error::{MayaError, Result};
use maya_core::language::{LanguageBinding, SttRoute};
use maya_core::session::SessionState;
use maya_core::types::ReplyMessage;
use maya_documents::PersonaStore;
use maya_providers::{ChatModel, ExtractVisemes, SpeechToText, TextToSpeech};

use crate::background::BackgroundTasks;
use crate::wav::{SYNTH_SAMPLE_RATE, pcm_to_wav};

pub struct TurnPipeline {
    session: Arc<SessionState>,
    deepgram: Arc<dyn SpeechToText>,
    groq: Arc<dyn SpeechToText>,
    chat: Arc<dyn ChatModel>,
    tts: Arc<dyn TextToSpeech>,
    visemes: Arc<dyn ExtractVisemes>,
    persona: Arc<PersonaStore>,
    audio_dir: PathBuf,
    background: Arc<BackgroundTasks>,
}

impl TurnPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<SessionState>,
        deepgram: Arc<dyn SpeechToText>,
        groq: Arc<dyn SpeechToText>,
        chat: Arc<dyn ChatModel>,
        tts: Arc<dyn TextToSpeech>,
        visemes: Arc<dyn ExtractVisemes>,
        persona: Arc<PersonaStore>,
        audio_dir: PathBuf,
        background: Arc<BackgroundTasks>,
    ) -> Self {
        Self {
            session,
            deepgram,
            groq,
            chat,
            tts,
            visemes,
            persona,
            audio_dir,
            background,
        }
    }

    /// Process one recorded utterance into a ready-to-play reply package.
    pub async fn run(&self, audio: Vec<u8>) -> Result<Vec<ReplyMessage>> {
        let _turn = self.session.begin_turn().await;
        let turn_id = uuid::Uuid::new_v4().simple().to_string();
        let start = Instant::now();
        let binding = self.session.binding().await;

        // Stage 1: transcription, routed by the bound language.
        let transcript = self.transcribe(&audio, &binding).await;
        info!(
            turn = %turn_id,
            chars = transcript.len(),
            language = %binding.language,
            "Transcription stage done"
        );

        // Stage 2: the transcript joins the history even when empty — an
        // empty turn produces a clarification reply, not an abort.
        self.session.push_user(transcript.clone()).await;

        // Stage 3b: persona-document update, concurrent with reply
        // generation and never awaited by the response path.
        self.spawn_persona_update(transcript.clone()).await;

        // Stage 3a: reply generation. A failure here is fatal to the turn.
        let (user_history, bot_history) = self.session.history().await;
        let mut messages = self
            .chat
            .generate_reply(&user_history, &bot_history, &transcript)
            .await
            .map_err(|e| MayaError::Reply(e.to_string()))?;
        let first = messages
            .first()
            .ok_or_else(|| MayaError::Reply("reply contains no messages".into()))?;
        self.session.push_bot(first.text.clone()).await;
        debug!(count = messages.len(), "Reply generated");

        // Stage 4: audio + viseme enrichment, sequential per message.
        self.enrich(&mut messages, &binding).await;

        // Stage 6: form extraction from this question/answer pair.
        self.spawn_form_extraction().await;

        info!(
            turn = %turn_id,
            messages = messages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Turn complete"
        );
        Ok(messages)
    }

    /// Route transcription by the bound language. Any failure degrades to an
    /// empty transcript; the turn continues.
    async fn transcribe(&self, audio: &[u8], binding: &LanguageBinding) -> String {
        let result = match &binding.route {
            SttRoute::Deepgram { code } => self.deepgram.transcribe(audio, Some(code)).await,
            SttRoute::Groq { code } => self.groq.transcribe(audio, code.as_deref()).await,
            SttRoute::Unsupported => {
                error!(
                    language = %binding.language,
                    "No transcription provider supports the bound language"
                );
                return String::new();
            }
        };

        match result {
            Ok(text) => text,
            Err(e) => {
                warn!(%e, "Transcription failed, continuing with empty transcript");
                String::new()
            }
        }
    }

    /// Synthesize audio and extract the viseme timeline for each message in
    /// order. Empty-text messages are skipped; a failure on one message does
    /// not stop the rest, and a message is only ever returned fully enriched
    /// or not at all.
    async fn enrich(&self, messages: &mut [ReplyMessage], binding: &LanguageBinding) {
        for (index, message) in messages.iter_mut().enumerate() {
            if message.text.is_empty() {
                debug!(index, "Skipping enrichment for empty message");
                continue;
            }

            let pcm = match self.tts.synthesize(&message.text, &binding.voice_id).await {
                Ok(pcm) => pcm,
                Err(e) => {
                    warn!(index, %e, "Speech synthesis failed for message");
                    continue;
                }
            };

            let wav = pcm_to_wav(&pcm, SYNTH_SAMPLE_RATE, 1, 16);
            let wav_path = self.audio_dir.join(format!("message_{index}.wav"));
            if let Err(e) = self.write_wav(&wav_path, &wav).await {
                warn!(index, %e, "Failed to persist WAV for message");
                continue;
            }

            let track = match self.visemes.extract(&wav_path).await {
                Ok(track) => track,
                Err(e) => {
                    warn!(index, %e, "Viseme extraction failed for message");
                    continue;
                }
            };

            message.audio = Some(base64::engine::general_purpose::STANDARD.encode(&wav));
            message.lipsync = Some(track);
            debug!(index, wav_bytes = wav.len(), "Message enriched");
        }
    }

    async fn write_wav(&self, path: &std::path::Path, wav: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.audio_dir).await?;
        tokio::fs::write(path, wav).await?;
        Ok(())
    }

    /// Stage 3b: regenerate the persona document from the new transcript.
    async fn spawn_persona_update(&self, transcript: String) {
        let chat = self.chat.clone();
        let persona = self.persona.clone();

        self.background
            .spawn("persona-update", async move {
                let doc = persona.load().await;
                let updated = chat.update_persona(&doc, &transcript).await?;
                persona.replace_from_model(updated).await?;
                Ok(())
            })
            .await;
    }

    /// Stage 6: extract form fields from the question just asked and the
    /// answer just given, and merge them under the non-empty-overwrite rule.
    async fn spawn_form_extraction(&self) {
        let question = self.session.last_question().await;
        let Some(answer) = self.session.last_answer().await else {
            return;
        };
        let form = self.session.form_snapshot().await.to_json();

        let chat = self.chat.clone();
        let session = self.session.clone();

        self.background
            .spawn("form-extraction", async move {
                let updates = chat.extract_form_fields(&form, &question, &answer).await?;
                let applied = session.merge_form(&updates).await;
                debug!(applied, "Form extraction merged");
                Ok(())
            })
            .await;
    }
}
