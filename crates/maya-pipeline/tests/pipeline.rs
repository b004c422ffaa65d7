//! End-to-end pipeline tests against in-process fake providers.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use maya_core::language::{LanguageBinding, SttRoute, lookup};
use maya_core::session::SessionState;
use maya_core::types::{MouthCue, ReplyMessage, VisemeTrack};
use maya_documents::PersonaStore;
use maya_pipeline::{BackgroundTasks, TurnPipeline};
use maya_providers::{ChatModel, ExtractVisemes, SpeechToText, TextToSpeech};

// --- Fakes ---

struct FixedStt {
    text: &'static str,
    called: AtomicBool,
}

impl FixedStt {
    fn new(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text,
            called: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl SpeechToText for FixedStt {
    fn id(&self) -> &str {
        "fixed"
    }

    async fn transcribe(&self, _audio: &[u8], _language: Option<&str>) -> anyhow::Result<String> {
        self.called.store(true, Ordering::SeqCst);
        Ok(self.text.to_string())
    }
}

struct FailingStt;

#[async_trait]
impl SpeechToText for FailingStt {
    fn id(&self) -> &str {
        "failing"
    }

    async fn transcribe(&self, _audio: &[u8], _language: Option<&str>) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }
}

struct ScriptedChat {
    reply_texts: Vec<&'static str>,
    form_updates: Value,
    persona_revision: Value,
    fail_reply: bool,
}

impl ScriptedChat {
    fn replying(texts: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            reply_texts: texts,
            form_updates: json!({}),
            persona_revision: json!({}),
            fail_reply: false,
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn generate_reply(
        &self,
        _user_history: &[String],
        _bot_history: &[String],
        _transcript: &str,
    ) -> anyhow::Result<Vec<ReplyMessage>> {
        if self.fail_reply {
            anyhow::bail!("model returned malformed JSON");
        }
        Ok(self.reply_texts.iter().copied().map(ReplyMessage::new).collect())
    }

    async fn update_persona(&self, persona: &Value, _transcript: &str) -> anyhow::Result<Value> {
        let mut doc = persona.clone();
        if let (Some(map), Some(revision)) = (doc.as_object_mut(), self.persona_revision.as_object())
        {
            for (k, v) in revision {
                map.insert(k.clone(), v.clone());
            }
        }
        Ok(doc)
    }

    async fn extract_form_fields(
        &self,
        _form: &Value,
        _question: &str,
        _answer: &str,
    ) -> anyhow::Result<Value> {
        Ok(self.form_updates.clone())
    }

    async fn recommendations(&self, _profile: &Value) -> anyhow::Result<String> {
        Ok("none".into())
    }
}

struct TonePcm;

#[async_trait]
impl TextToSpeech for TonePcm {
    async fn synthesize(&self, _text: &str, _voice_id: &str) -> anyhow::Result<Vec<u8>> {
        Ok(vec![0u8; 1024])
    }
}

struct FailingTts;

#[async_trait]
impl TextToSpeech for FailingTts {
    async fn synthesize(&self, _text: &str, _voice_id: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("synthesis unavailable")
    }
}

struct FixedVisemes;

#[async_trait]
impl ExtractVisemes for FixedVisemes {
    async fn extract(&self, wav_path: &Path) -> anyhow::Result<VisemeTrack> {
        anyhow::ensure!(wav_path.exists(), "WAV must be written before extraction");
        Ok(VisemeTrack {
            metadata: None,
            mouth_cues: vec![MouthCue {
                start: 0.0,
                end: 0.4,
                value: "B".into(),
            }],
        })
    }
}

// --- Harness ---

struct Harness {
    session: Arc<SessionState>,
    persona: Arc<PersonaStore>,
    background: Arc<BackgroundTasks>,
    pipeline: TurnPipeline,
    _dir: tempfile::TempDir,
}

async fn harness(
    deepgram: Arc<dyn SpeechToText>,
    groq: Arc<dyn SpeechToText>,
    chat: Arc<dyn ChatModel>,
    tts: Arc<dyn TextToSpeech>,
    binding: LanguageBinding,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let session = Arc::new(SessionState::new());
    session.set_binding(binding).await;
    let persona = Arc::new(PersonaStore::new(dir.path().join("userpersona.json")));
    let background = Arc::new(BackgroundTasks::new(Duration::from_secs(5)));

    let pipeline = TurnPipeline::new(
        session.clone(),
        deepgram,
        groq,
        chat,
        tts,
        Arc::new(FixedVisemes),
        persona.clone(),
        dir.path().join("audios"),
        background.clone(),
    );

    Harness {
        session,
        persona,
        background,
        pipeline,
        _dir: dir,
    }
}

#[tokio::test]
async fn scenario_a_full_turn_in_english() {
    let stt = FixedStt::new("My name is Ana.");
    let h = harness(
        stt.clone(),
        FixedStt::new("unused"),
        ScriptedChat::replying(vec!["Nice to meet you, Ana. How are you today?"]),
        Arc::new(TonePcm),
        lookup("english").unwrap(),
    ).await;

    let messages = h.pipeline.run(b"fake-webm".to_vec()).await.unwrap();

    assert!(stt.called.load(Ordering::SeqCst));
    let (users, bots) = h.session.history().await;
    assert_eq!(users, vec!["My name is Ana."]);
    assert_eq!(bots.len(), 1);

    assert_eq!(messages.len(), 1);
    let msg = &messages[0];
    assert!(!msg.text.is_empty());
    assert!(msg.audio.as_ref().is_some_and(|a| !a.is_empty()));
    assert!(msg.lipsync.as_ref().is_some_and(|l| !l.mouth_cues.is_empty()));
}

#[tokio::test]
async fn scenario_b_unsupported_language_still_replies() {
    let deepgram = FixedStt::new("should not be called");
    let groq = FixedStt::new("should not be called either");
    let h = harness(
        deepgram.clone(),
        groq.clone(),
        ScriptedChat::replying(vec![
            "Sorry i was unable to hear you can you please repeat it again",
        ]),
        Arc::new(TonePcm),
        LanguageBinding {
            language: "klingon".into(),
            route: SttRoute::Unsupported,
            voice_id: "9BWtsMINqrJLrRacOk9x".into(),
        },
    ).await;

    let messages = h.pipeline.run(b"audio".to_vec()).await.unwrap();

    assert!(!deepgram.called.load(Ordering::SeqCst));
    assert!(!groq.called.load(Ordering::SeqCst));
    let (users, _) = h.session.history().await;
    assert_eq!(users, vec![""]);
    assert!(!messages.is_empty());
}

#[tokio::test]
async fn transcription_failure_degrades_to_empty_turn() {
    let h = harness(
        Arc::new(FailingStt),
        FixedStt::new("unused"),
        ScriptedChat::replying(vec!["Could you repeat that?"]),
        Arc::new(TonePcm),
        lookup("german").unwrap(),
    ).await;

    let messages = h.pipeline.run(b"audio".to_vec()).await.unwrap();
    let (users, _) = h.session.history().await;
    assert_eq!(users, vec![""]);
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn reply_failure_is_fatal_but_keeps_user_message() {
    let chat = Arc::new(ScriptedChat {
        reply_texts: vec![],
        form_updates: json!({}),
        persona_revision: json!({}),
        fail_reply: true,
    });
    let h = harness(
        FixedStt::new("Hello"),
        FixedStt::new("unused"),
        chat,
        Arc::new(TonePcm),
        lookup("english").unwrap(),
    ).await;

    let err = h.pipeline.run(b"audio".to_vec()).await.unwrap_err();
    assert!(err.to_string().contains("Reply generation error"));

    // Stage 2 ran before the failure: the transcript is in the history.
    let (users, bots) = h.session.history().await;
    assert_eq!(users, vec!["Hello"]);
    assert!(bots.is_empty());
}

#[tokio::test]
async fn empty_text_message_skips_enrichment_without_aborting() {
    let h = harness(
        FixedStt::new("Hi"),
        FixedStt::new("unused"),
        ScriptedChat::replying(vec!["", "This one speaks."]),
        Arc::new(TonePcm),
        lookup("english").unwrap(),
    ).await;

    let messages = h.pipeline.run(b"audio".to_vec()).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].audio.is_none());
    assert!(messages[0].lipsync.is_none());
    assert!(messages[1].audio.is_some());
    assert!(messages[1].lipsync.is_some());
}

#[tokio::test]
async fn synthesis_failure_leaves_message_unenriched_but_turn_succeeds() {
    let h = harness(
        FixedStt::new("Hi"),
        FixedStt::new("unused"),
        ScriptedChat::replying(vec!["First", "Second"]),
        Arc::new(FailingTts),
        lookup("english").unwrap(),
    ).await;

    let messages = h.pipeline.run(b"audio".to_vec()).await.unwrap();
    assert_eq!(messages.len(), 2);
    // No half-enriched messages: both fields absent together.
    for msg in &messages {
        assert!(msg.audio.is_none());
        assert!(msg.lipsync.is_none());
    }
}

#[tokio::test]
async fn form_extraction_merges_in_background() {
    let chat = Arc::new(ScriptedChat {
        reply_texts: vec!["Thanks for sharing."],
        form_updates: json!({"Name": "Schmidt", "Vorname": "Anna"}),
        persona_revision: json!({}),
        fail_reply: false,
    });
    let h = harness(
        FixedStt::new("My name is Anna Schmidt"),
        FixedStt::new("unused"),
        chat,
        Arc::new(TonePcm),
        lookup("english").unwrap(),
    ).await;

    h.pipeline.run(b"audio".to_vec()).await.unwrap();
    h.background.wait_idle().await;

    let form = h.session.form_snapshot().await;
    assert_eq!(form.get("Name"), Some("Schmidt"));
    assert_eq!(form.get("Vorname"), Some("Anna"));
}

#[tokio::test]
async fn scenario_c_empty_extraction_never_clears_a_field() {
    let chat = Arc::new(ScriptedChat {
        reply_texts: vec!["Noted."],
        form_updates: json!({"Name": ""}),
        persona_revision: json!({}),
        fail_reply: false,
    });
    let h = harness(
        FixedStt::new("..."),
        FixedStt::new("unused"),
        chat,
        Arc::new(TonePcm),
        lookup("english").unwrap(),
    ).await;

    h.session.merge_form(&json!({"Name": "Schmidt"})).await;

    h.pipeline.run(b"audio".to_vec()).await.unwrap();
    h.background.wait_idle().await;

    assert_eq!(h.session.form_snapshot().await.get("Name"), Some("Schmidt"));
}

#[tokio::test]
async fn persona_update_runs_in_background_and_preserves_location() {
    let chat = Arc::new(ScriptedChat {
        reply_texts: vec!["Hello Ahmad."],
        form_updates: json!({}),
        persona_revision: json!({"Name": "Ahmad Khalid", "Latitude": 0.0, "Longitude": 0.0}),
        fail_reply: false,
    });
    let h = harness(
        FixedStt::new("My name is Ahmad Khalid"),
        FixedStt::new("unused"),
        chat,
        Arc::new(TonePcm),
        lookup("english").unwrap(),
    ).await;

    h.persona.set_location(52.52, 13.405).await.unwrap();

    h.pipeline.run(b"audio".to_vec()).await.unwrap();
    h.background.wait_idle().await;

    let doc = h.persona.load().await;
    assert_eq!(doc["Name"], "Ahmad Khalid");
    // System-owned fields survive the model revision.
    assert_eq!(doc["Latitude"], json!(52.52));
    assert_eq!(doc["Longitude"], json!(13.405));
}

#[tokio::test]
async fn wav_files_are_written_per_message_index() {
    let h = harness(
        FixedStt::new("Hi"),
        FixedStt::new("unused"),
        ScriptedChat::replying(vec!["One", "Two"]),
        Arc::new(TonePcm),
        lookup("english").unwrap(),
    ).await;

    h.pipeline.run(b"audio".to_vec()).await.unwrap();

    let audio_dir = h._dir.path().join("audios");
    assert!(audio_dir.join("message_0.wav").exists());
    assert!(audio_dir.join("message_1.wav").exists());
}
