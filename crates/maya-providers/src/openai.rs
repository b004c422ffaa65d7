//! OpenAI Chat Completions client.
//!
//! One client serves the four text-generation call sites: reply generation,
//! persona-document updates, form-field extraction, and search-grounded
//! recommendations. They stay separate operations with distinct prompts and
//! response schemas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use maya_core::types::ReplyMessage;

use crate::ChatModel;

const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
    search_model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(
        api_key: String,
        model: String,
        search_model: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: OPENAI_BASE_URL.into(),
            api_key,
            model,
            search_model,
            client,
        }
    }

    async fn complete(&self, body: &ChatRequest<'_>) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {status}: {text}");
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response has no content"))?;
        Ok(content.trim().to_string())
    }
}

// --- Request/response types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_search_options: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Parse the strict reply schema: an object with a `messages` array (a bare
/// array is tolerated). Anything else is a hard error for the turn.
fn parse_reply_messages(content: &str) -> anyhow::Result<Vec<ReplyMessage>> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("reply is not valid JSON: {e}"))?;

    let array = match value {
        Value::Object(mut map) => match map.remove("messages") {
            Some(Value::Array(array)) => array,
            _ => anyhow::bail!("reply object has no messages array"),
        },
        Value::Array(array) => array,
        _ => anyhow::bail!("reply is neither an object nor an array"),
    };

    if array.is_empty() {
        anyhow::bail!("reply contains no messages");
    }

    array
        .into_iter()
        .map(|v| {
            serde_json::from_value::<ReplyMessage>(v)
                .map_err(|e| anyhow::anyhow!("malformed reply message: {e}"))
        })
        .collect()
}

// --- Prompts ---

const REPLY_SYSTEM_PROMPT: &str = r#"You are Maya, a female multilingual therapeutic chatbot with a warm, empathetic personality. Always refer to yourself as female. Build genuine rapport through natural conversation while organically working in the assessment questions below; never make it feel like a clinical interview.

CONVERSATION STYLE:
- Respond directly to what the user shares, showing active listening.
- Keep messages crisp, around 40 words, and ask at most one question per message.
- If you receive an empty message "" reply with "Sorry i was unable to hear you can you please repeat it again".
- If the user gives only a first name, ask for their full name once.
- If the input is nonsensical, ask the user to rephrase.

LANGUAGE GUIDELINE:
- CRITICAL: Always respond in the exact language of the user's most recent message; never mix languages within a response and never switch language based on nationality or place of birth. Default to English when unsure.

QUESTIONS TO INCORPORATE NATURALLY (one at a time, never repeat an answered one):
full name; age and date of birth; country of birth; place of birth; nationality; gender (male/female/diverse/don't want to specify); marital status (single/married/widowed/divorced); physical, mental, cognitive or sensory disabilities; single parent or pregnant; loss or separation from close family, or social isolation; experiences of physical or psychological violence during flight or stay; professional skills or qualifications; practical tips for the hearing (preferred language, technical assistance, accompanying person, other circumstances).

Check the conversation history before each response so you never repeat a question already asked, and thank the user once all questions are covered.

RESPONSE FORMAT:
Always answer with strict JSON of the shape
{"messages": [{"text": "...", "facialExpression": "smile", "animation": "Talking_1"}]}
with no additional text. Always fill facialExpression with "smile" and animation with "Talking_1"."#;

const PERSONA_SYSTEM_PROMPT: &str = r#"You are a persona management assistant maintaining a JSON object of user information. You receive the current persona JSON and the user's message. Add information that is explicitly mentioned or reasonably inferred (including languages inferred from the message language); never modify fields that are already populated.

IMPORTANT:
- Output must be strictly JSON with no extra text.
- DO NOT modify the Latitude and Longitude fields; they are system-managed.
- Always write values in English regardless of the input language.
- Fill fields only from what the user actually says.

The persona JSON has these fields: Name, Age, DateOfBirth, Gender, OriginCountry, Education, Languages (array), ProfessionalSkills (array), GeneralHealth, MedicalConditions, StressLevel, DesiredProfession, Latitude, Longitude."#;

const FORM_SYSTEM_PROMPT: &str = r#"You are filling a German hearing-form dictionary from one question/answer pair. You receive the current dictionary, the question the bot asked, and the user's answer.

CRITICAL GUIDELINES:
- Always fill values in German, whatever the input language.
- Return ONLY the fields that need updating, as strict JSON.
- Never invent values; fill only what the answer actually states.
- Put the first name in Vorname and the last name in Name.
- Transliterate umlauts in your output: ä→a, ö→o, ü→u, ß→b.
- Selection fields take exactly one option: Geschlecht (weiblich/mannlich/divers/keine Angabe), Familienstand (ledig/verheiratet/verwitwet/geschieden).
- Yes/No fields are filled with "Yes" when the condition applies, otherwise left out: korperlich, seelisch, geistig, Sinnesbeeintrachtigung, Alleinerziehende, Schwangere, alter als 65 Jahre, Verlust oder Trennung von engen Familienangehorigen, Soziale Isolation, Erfahrungen mit korperlicher oder seelischer Gewalt wahrend Flucht oder Aufenthalt.
- Text fields: Name, Vorname, Geburtsdatum, Geburtsland, Geburtsort, Staatsangehorigkeit, Praktische Hinweise zur Durchfuhrung der Anhorung.
- Always include "Im Auftrag": "MayaCode" when updating."#;

const RECOMMENDATION_SYSTEM_PROMPT: &str = r#"You provide location-based recommendations for a user profile containing their current location (Country and State), and optionally origin country, skills, languages, and medical conditions.

- If skills are provided: up to 3 real job opportunities matching them in the current location, each with company, title, a 1-2 sentence description, and a link.
- If languages are provided: up to 2 language-based jobs (translation, interpretation, auditing) in the current location, each with organization, position, description, and a link.
- If medical conditions are provided: up to 3 healthcare providers specializing in them in the current location, each with facility, specialty, description, address, and a link.
- Omit any section whose input data is missing; never ask for more details and never invent results — always search for real, currently existing entries and always include links.
- Output in English only, without asterisks.
- If location data is insufficient, state "Insufficient location data to provide specific recommendations"."#;

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn generate_reply(
        &self,
        user_history: &[String],
        bot_history: &[String],
        transcript: &str,
    ) -> anyhow::Result<Vec<ReplyMessage>> {
        let system = format!(
            "{REPLY_SYSTEM_PROMPT}\n\nCONVERSATION MEMORY:\nUser_messages: {}\nBot_messages: {}",
            serde_json::to_string(user_history)?,
            serde_json::to_string(bot_history)?,
        );

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                json!({"role": "system", "content": system}),
                json!({"role": "user", "content": transcript}),
            ],
            max_tokens: Some(2000),
            temperature: Some(0.7),
            response_format: None,
            web_search_options: None,
        };

        debug!(model = %self.model, history = user_history.len(), "Generating reply");
        let content = self.complete(&body).await?;
        parse_reply_messages(&content)
    }

    async fn update_persona(
        &self,
        persona: &Value,
        transcript: &str,
    ) -> anyhow::Result<Value> {
        let prompt = format!(
            "Current JSON:\n{}\n\nUser Message: {transcript}",
            serde_json::to_string_pretty(persona)?
        );

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                json!({"role": "system", "content": PERSONA_SYSTEM_PROMPT}),
                json!({"role": "user", "content": prompt}),
            ],
            max_tokens: None,
            temperature: Some(0.7),
            response_format: None,
            web_search_options: None,
        };

        let content = self.complete(&body).await?;
        let updated: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("persona update is not valid JSON: {e}"))?;
        if !updated.is_object() {
            anyhow::bail!("persona update is not a JSON object");
        }
        Ok(updated)
    }

    async fn extract_form_fields(
        &self,
        form: &Value,
        question: &str,
        answer: &str,
    ) -> anyhow::Result<Value> {
        let prompt = format!(
            "Current_Dict: {form}\n\nQuestion_asked\n\"{question}\"\n\nUser_Response\n\"{answer}\""
        );

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                json!({"role": "system", "content": FORM_SYSTEM_PROMPT}),
                json!({"role": "user", "content": prompt}),
            ],
            max_tokens: None,
            temperature: Some(0.7),
            response_format: Some(json!({"type": "json_object"})),
            web_search_options: None,
        };

        let content = self.complete(&body).await?;
        let updates: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("form extraction is not valid JSON: {e}"))?;
        Ok(updates)
    }

    async fn recommendations(&self, profile: &Value) -> anyhow::Result<String> {
        let body = ChatRequest {
            model: &self.search_model,
            messages: vec![
                json!({"role": "system", "content": RECOMMENDATION_SYSTEM_PROMPT}),
                json!({"role": "user", "content": profile.to_string()}),
            ],
            max_tokens: None,
            temperature: None,
            response_format: None,
            web_search_options: Some(json!({"search_context_size": "high"})),
        };

        debug!(model = %self.search_model, "Requesting recommendations");
        let text = self.complete(&body).await?;
        if text.is_empty() {
            warn!("Recommendation response was empty");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply_object_form() {
        let content = r#"{
            "messages": [
                { "text": "Hello! How are you feeling today?", "facialExpression": "smile", "animation": "Talking_1" }
            ]
        }"#;
        let messages = parse_reply_messages(content).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Hello! How are you feeling today?");
        assert!(messages[0].audio.is_none());
    }

    #[test]
    fn test_parse_reply_bare_array() {
        let content = r#"[
            { "text": "One", "facialExpression": "smile", "animation": "Talking_1" },
            { "text": "Two", "facialExpression": "smile", "animation": "Talking_1" }
        ]"#;
        let messages = parse_reply_messages(content).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "Two");
    }

    #[test]
    fn test_parse_reply_rejects_empty() {
        assert!(parse_reply_messages(r#"{"messages": []}"#).is_err());
    }

    #[test]
    fn test_parse_reply_rejects_non_json() {
        assert!(parse_reply_messages("I'm sorry, here is my answer:").is_err());
    }

    #[test]
    fn test_parse_reply_rejects_wrong_shape() {
        assert!(parse_reply_messages(r#"{"reply": "hello"}"#).is_err());
        assert!(parse_reply_messages(r#""just a string""#).is_err());
    }

    #[test]
    fn test_chat_request_serialization() {
        let body = ChatRequest {
            model: "gpt-4.1",
            messages: vec![json!({"role": "user", "content": "hi"})],
            max_tokens: Some(2000),
            temperature: Some(0.7),
            response_format: Some(json!({"type": "json_object"})),
            web_search_options: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "gpt-4.1");
        assert_eq!(value["response_format"]["type"], "json_object");
        // Unset options must not appear on the wire
        assert!(value.get("web_search_options").is_none());
    }

    #[test]
    fn test_chat_response_parse() {
        let json = r#"{
            "choices": [ { "message": { "content": "  {\"messages\": []}  " } } ]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref().map(str::trim),
            Some(r#"{"messages": []}"#)
        );
    }
}
