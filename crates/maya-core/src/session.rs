//! Session state — the mutable conversation context shared by the pipeline,
//! the HTTP handlers, and the background extraction tasks.
//!
//! All state sits behind one async mutex, and the pipeline additionally
//! serializes whole turns through `begin_turn`, so utterance appends get a
//! total order matching transcription completion order.

use tokio::sync::{Mutex, MutexGuard};

use crate::form::FormFill;
use crate::language::LanguageBinding;

#[derive(Debug, Default)]
struct SessionInner {
    user_messages: Vec<String>,
    bot_messages: Vec<String>,
    form: FormFill,
    binding: LanguageBinding,
}

/// Process-wide conversation state for the single active session.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<SessionInner>,
    turn: Mutex<()>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the turn lock. One active turn per session: the guard is held
    /// across the synchronous path of the pipeline.
    pub async fn begin_turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }

    pub async fn push_user(&self, text: String) {
        self.inner.lock().await.user_messages.push(text);
    }

    pub async fn push_bot(&self, text: String) {
        self.inner.lock().await.bot_messages.push(text);
    }

    /// Snapshot of both utterance lists in conversation order.
    pub async fn history(&self) -> (Vec<String>, Vec<String>) {
        let inner = self.inner.lock().await;
        (inner.user_messages.clone(), inner.bot_messages.clone())
    }

    /// The question the bot asked before the latest user answer — the
    /// second-most-recent bot message, or empty early in the conversation.
    pub async fn last_question(&self) -> String {
        let inner = self.inner.lock().await;
        let n = inner.bot_messages.len();
        if n >= 2 {
            inner.bot_messages[n - 2].clone()
        } else {
            String::new()
        }
    }

    pub async fn last_answer(&self) -> Option<String> {
        self.inner.lock().await.user_messages.last().cloned()
    }

    pub async fn binding(&self) -> LanguageBinding {
        self.inner.lock().await.binding.clone()
    }

    pub async fn set_binding(&self, binding: LanguageBinding) {
        self.inner.lock().await.binding = binding;
    }

    pub async fn form_snapshot(&self) -> FormFill {
        self.inner.lock().await.form.clone()
    }

    /// Merge a background extraction result into the form dictionary under
    /// the non-empty-overwrite invariant. Returns fields changed.
    pub async fn merge_form(&self, updates: &serde_json::Value) -> usize {
        self.inner.lock().await.form.merge(updates)
    }

    /// Clear both utterance lists and reinitialize the form from template.
    /// The language binding survives the reset.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.user_messages.clear();
        inner.bot_messages.clear();
        inner.form = FormFill::template();
    }
}
