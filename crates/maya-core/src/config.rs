//! Configuration loading and secret resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level backend configuration, loaded from a JSON5 file with
/// `${ENV_VAR}` substitution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub viseme: VisemeConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed by CORS. The avatar frontend plus local dev servers.
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            allowed_origins: default_origins(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_origins() -> Vec<String> {
    vec![
        "https://test.mayacode.io".into(),
        "http://localhost:3000".into(),
        "http://localhost:5173".into(),
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub deepgram: DeepgramConfig,

    #[serde(default)]
    pub groq: GroqConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepgramConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_deepgram_model")]
    pub model: String,
}

impl Default for DeepgramConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("DEEPGRAM_API_KEY".into()),
            model: default_deepgram_model(),
        }
    }
}

fn default_deepgram_model() -> String {
    "nova-2-general".into()
}

impl DeepgramConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_groq_model")]
    pub model: String,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("GROQ_API_KEY".into()),
            model: default_groq_model(),
        }
    }
}

fn default_groq_model() -> String {
    "whisper-large-v3".into()
}

impl GroqConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Model for reply generation, persona updates, and form extraction.
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Search-capable model for the recommendation endpoint.
    #[serde(default = "default_search_model")]
    pub search_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".into()),
            model: default_openai_model(),
            search_model: default_search_model(),
        }
    }
}

fn default_openai_model() -> String {
    "gpt-4.1".into()
}

fn default_search_model() -> String {
    "gpt-4o-mini-search-preview".into()
}

impl OpenAiConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_tts_model")]
    pub model: String,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: Some("ELEVENLABS_API_KEY".into()),
            model: default_tts_model(),
        }
    }
}

fn default_tts_model() -> String {
    "eleven_flash_v2_5".into()
}

impl ElevenLabsConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Mouth-shape extraction tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisemeConfig {
    /// Path to the Rhubarb Lip Sync binary.
    #[serde(default = "default_rhubarb_binary")]
    pub binary: String,

    #[serde(default = "default_rhubarb_threads")]
    pub threads: u32,
}

impl Default for VisemeConfig {
    fn default() -> Self {
        Self {
            binary: default_rhubarb_binary(),
            threads: default_rhubarb_threads(),
        }
    }
}

fn default_rhubarb_binary() -> String {
    "./rhubarb/rhubarb".into()
}

fn default_rhubarb_threads() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    pub from: String,
    pub to: String,

    #[serde(default = "default_mail_subject")]
    pub subject: String,

    #[serde(default = "default_mail_body")]
    pub body: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_subject() -> String {
    "PDF Document from MayaCode".into()
}

fn default_mail_body() -> String {
    "Please find the attached PDF document.\n\nBest regards,\nMayaCode".into()
}

impl SmtpConfig {
    pub fn resolve_password(&self) -> Option<String> {
        resolve_secret_field(&self.password, &self.password_env)
    }
}

/// Persisted-state layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_persona_path")]
    pub persona_path: PathBuf,

    #[serde(default = "default_sheet_path")]
    pub sheet_path: PathBuf,

    /// Sidecar row log backing the spreadsheet rebuild.
    #[serde(default = "default_rows_path")]
    pub rows_path: PathBuf,

    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    #[serde(default = "default_pdf_template")]
    pub pdf_template: PathBuf,

    #[serde(default = "default_pdf_output")]
    pub pdf_output: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persona_path: default_persona_path(),
            sheet_path: default_sheet_path(),
            rows_path: default_rows_path(),
            audio_dir: default_audio_dir(),
            pdf_template: default_pdf_template(),
            pdf_output: default_pdf_output(),
        }
    }
}

fn default_persona_path() -> PathBuf {
    "./userpersona.json".into()
}

fn default_sheet_path() -> PathBuf {
    "./User_Data.xlsx".into()
}

fn default_rows_path() -> PathBuf {
    "./User_Data.rows.json".into()
}

fn default_audio_dir() -> PathBuf {
    "audios".into()
}

fn default_pdf_template() -> PathBuf {
    "editable5.pdf".into()
}

fn default_pdf_output() -> PathBuf {
    "filled.pdf".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::MayaError::Io)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::MayaError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.providers.deepgram.resolve_api_key().is_none() {
            warnings.push("Deepgram has no API key configured".to_string());
        }
        if self.providers.groq.resolve_api_key().is_none() {
            warnings.push("Groq has no API key configured".to_string());
        }
        if self.providers.openai.resolve_api_key().is_none() {
            warnings.push("OpenAI has no API key configured".to_string());
        }
        if self.providers.elevenlabs.resolve_api_key().is_none() {
            warnings.push("ElevenLabs has no API key configured".to_string());
        }

        if let Some(smtp) = &self.smtp {
            if smtp.resolve_password().is_none() {
                warnings.push("SMTP has no password configured".to_string());
            }
        }

        if self.server.port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        (warnings, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_MAYA_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_MAYA_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_MAYA_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_MAYA_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#)); // empty string
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.providers.openai.model, "gpt-4.1");
        assert_eq!(config.providers.deepgram.model, "nova-2-general");
        assert_eq!(config.viseme.threads, 2);
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_resolve_api_key_priority() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_MAYA_API_KEY", "from-env") };
        let dg = DeepgramConfig {
            api_key: None,
            api_key_env: Some("TEST_MAYA_API_KEY".into()),
            model: default_deepgram_model(),
        };
        assert_eq!(dg.resolve_api_key(), Some("from-env".into()));

        let dg2 = DeepgramConfig {
            api_key: Some("direct-key".into()),
            api_key_env: Some("TEST_MAYA_API_KEY".into()),
            model: default_deepgram_model(),
        };
        // Direct key takes priority
        assert_eq!(dg2.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_MAYA_API_KEY") };
    }

    #[test]
    fn test_load_json5_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(
            &path,
            r#"{
                // dev override
                server: { port: 9000 },
                providers: { openai: { model: "gpt-4o" } },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.providers.openai.model, "gpt-4o");
        // Untouched sections keep their defaults
        assert_eq!(config.providers.groq.model, "whisper-large-v3");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/maya.json5")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_validate_missing_keys_warn() {
        let config = Config {
            providers: ProvidersConfig {
                openai: OpenAiConfig {
                    api_key: None,
                    api_key_env: Some("NONEXISTENT_MAYA_OPENAI".into()),
                    ..OpenAiConfig::default()
                },
                ..ProvidersConfig::default()
            },
            ..Config::default()
        };
        let (warnings, errors) = config.validate();
        assert!(warnings.iter().any(|w| w.contains("OpenAI")));
        assert!(errors.is_empty());
    }
}
