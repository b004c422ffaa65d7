//! Wire types shared between the pipeline and the frontend.

use serde::{Deserialize, Serialize};

/// Facial expression for one reply message.
///
/// The avatar frontend currently only renders the smiling face; the enum
/// exists so the wire format stays stable if more expressions are added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FacialExpression {
    #[default]
    #[serde(rename = "smile")]
    Smile,
}

/// Body animation for one reply message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Animation {
    #[default]
    #[serde(rename = "Talking_1")]
    Talking1,
}

/// One timed mouth shape in a viseme timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f64,
    pub end: f64,
    /// Mouth-shape code (Rhubarb's A–H, X).
    pub value: String,
}

/// A viseme timeline as produced by the mouth-shape extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisemeTrack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(rename = "mouthCues", default)]
    pub mouth_cues: Vec<MouthCue>,
}

impl VisemeTrack {
    pub fn is_empty(&self) -> bool {
        self.mouth_cues.is_empty()
    }
}

/// One unit of the bot's reply.
///
/// Created by reply generation with `text`/expression/animation only;
/// the pipeline attaches `audio` (base64 WAV) and `lipsync` afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub text: String,

    #[serde(rename = "facialExpression", default)]
    pub facial_expression: FacialExpression,

    #[serde(default)]
    pub animation: Animation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lipsync: Option<VisemeTrack>,
}

impl ReplyMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            facial_expression: FacialExpression::Smile,
            animation: Animation::Talking1,
            audio: None,
            lipsync: None,
        }
    }

    /// True once both enrichment fields are attached.
    pub fn is_enriched(&self) -> bool {
        self.audio.is_some() && self.lipsync.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_message_wire_shape() {
        let msg = ReplyMessage::new("Hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["text"], "Hello");
        assert_eq!(value["facialExpression"], "smile");
        assert_eq!(value["animation"], "Talking_1");
        // Enrichment fields are absent until attached
        assert!(value.get("audio").is_none());
        assert!(value.get("lipsync").is_none());
    }

    #[test]
    fn test_reply_message_from_model_output() {
        let json = json!({
            "text": "Hallo!",
            "facialExpression": "smile",
            "animation": "Talking_1"
        });
        let msg: ReplyMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.text, "Hallo!");
        assert!(!msg.is_enriched());
    }

    #[test]
    fn test_viseme_track_parse() {
        let json = r#"{
            "metadata": { "soundFile": "message_0.wav", "duration": 1.5 },
            "mouthCues": [
                { "start": 0.0, "end": 0.3, "value": "X" },
                { "start": 0.3, "end": 0.6, "value": "B" }
            ]
        }"#;
        let track: VisemeTrack = serde_json::from_str(json).unwrap();
        assert_eq!(track.mouth_cues.len(), 2);
        assert_eq!(track.mouth_cues[1].value, "B");
        assert!(!track.is_empty());
    }

    #[test]
    fn test_enriched_message_roundtrip() {
        let mut msg = ReplyMessage::new("Hi");
        msg.audio = Some("UklGRg==".into());
        msg.lipsync = Some(VisemeTrack {
            metadata: None,
            mouth_cues: vec![MouthCue {
                start: 0.0,
                end: 0.1,
                value: "A".into(),
            }],
        });
        assert!(msg.is_enriched());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["lipsync"]["mouthCues"][0]["value"], "A");
    }
}
