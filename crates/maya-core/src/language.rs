//! Language-to-provider routing.
//!
//! One table maps a spoken-language name to the transcription provider that
//! handles it, the ISO code to request, and the synthesis voice to use.
//! Languages outside the table resolve to nothing; a binding can also carry
//! an explicitly unsupported route so the pipeline degrades to an empty
//! transcript instead of failing the turn.

use serde::{Deserialize, Serialize};

/// Which transcription backend handles a language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SttRoute {
    /// Deepgram prerecorded transcription with a fixed language code.
    Deepgram { code: String },
    /// Groq Whisper transcription; `None` requests auto-detection.
    Groq { code: Option<String> },
    /// No provider supports this language.
    Unsupported,
}

/// The process-wide language/voice selection for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageBinding {
    pub language: String,
    pub route: SttRoute,
    pub voice_id: String,
}

impl Default for LanguageBinding {
    fn default() -> Self {
        // English is the session default until /api/set-language is called.
        lookup("english").unwrap_or(Self {
            language: "english".into(),
            route: SttRoute::Unsupported,
            voice_id: DEFAULT_VOICE.into(),
        })
    }
}

const DEFAULT_VOICE: &str = "9BWtsMINqrJLrRacOk9x";

/// (language, code, voice) rows handled by Deepgram.
const DEEPGRAM_LANGUAGES: &[(&str, &str, &str)] = &[
    ("english", "en", "9BWtsMINqrJLrRacOk9x"),
    ("hindi", "hi", "JNaMjd7t4u3EhgkVknn3"),
    ("german", "de", "rAmra0SCIYOxYmRNDSm3"),
    ("ukrainian", "uk", "U4IxWQ3B5B0suleGgLcn"),
    ("russian", "ru", "OowtKaZH9N7iuGbsd00l"),
    ("italian", "it", "MLpDWJvrjFIdb63xbJp8"),
];

/// (language, code, voice) rows handled by Groq Whisper. An empty code means
/// auto-detect.
const GROQ_LANGUAGES: &[(&str, &str, &str)] = &[
    ("urdu", "ur", "JNaMjd7t4u3EhgkVknn3"),
    ("farsi", "fa", "bj1uMlYGikistcXNmFoh"),
    ("arabic", "ar", "qi4PkV9c01kb869Vh7Su"),
    ("auto", "", "9BWtsMINqrJLrRacOk9x"),
    ("spanish", "es", "9BWtsMINqrJLrRacOk9x"),
    ("french", "fr", "9BWtsMINqrJLrRacOk9x"),
    ("chinese", "zh", "9BWtsMINqrJLrRacOk9x"),
    ("japanese", "ja", "9BWtsMINqrJLrRacOk9x"),
    ("korean", "ko", "9BWtsMINqrJLrRacOk9x"),
    ("portuguese", "pt", "9BWtsMINqrJLrRacOk9x"),
];

/// Resolve a language name (case-insensitive) to its binding.
pub fn lookup(language: &str) -> Option<LanguageBinding> {
    let name = language.to_lowercase();

    if let Some((lang, code, voice)) = DEEPGRAM_LANGUAGES.iter().find(|(l, _, _)| *l == name) {
        return Some(LanguageBinding {
            language: (*lang).into(),
            route: SttRoute::Deepgram {
                code: (*code).into(),
            },
            voice_id: (*voice).into(),
        });
    }

    if let Some((lang, code, voice)) = GROQ_LANGUAGES.iter().find(|(l, _, _)| *l == name) {
        return Some(LanguageBinding {
            language: (*lang).into(),
            route: SttRoute::Groq {
                code: (!code.is_empty()).then(|| (*code).to_string()),
            },
            voice_id: (*voice).into(),
        });
    }

    None
}

/// All language names accepted by `lookup`, for error messages.
pub fn supported_languages() -> Vec<&'static str> {
    DEEPGRAM_LANGUAGES
        .iter()
        .chain(GROQ_LANGUAGES.iter())
        .map(|(l, _, _)| *l)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deepgram_routing() {
        let binding = lookup("english").unwrap();
        assert_eq!(binding.route, SttRoute::Deepgram { code: "en".into() });
        assert_eq!(binding.voice_id, "9BWtsMINqrJLrRacOk9x");

        let binding = lookup("German").unwrap();
        assert_eq!(binding.route, SttRoute::Deepgram { code: "de".into() });
    }

    #[test]
    fn test_groq_routing() {
        let binding = lookup("arabic").unwrap();
        assert_eq!(
            binding.route,
            SttRoute::Groq {
                code: Some("ar".into())
            }
        );
        assert_eq!(binding.voice_id, "qi4PkV9c01kb869Vh7Su");
    }

    #[test]
    fn test_auto_routes_to_groq_detection() {
        let binding = lookup("auto").unwrap();
        assert_eq!(binding.route, SttRoute::Groq { code: None });
    }

    #[test]
    fn test_unknown_language_is_none() {
        assert!(lookup("klingon").is_none());
    }

    #[test]
    fn test_tables_are_disjoint() {
        for (lang, _, _) in DEEPGRAM_LANGUAGES {
            assert!(
                !GROQ_LANGUAGES.iter().any(|(l, _, _)| l == lang),
                "{lang} appears in both provider tables"
            );
        }
    }

    #[test]
    fn test_default_binding_is_english() {
        let binding = LanguageBinding::default();
        assert_eq!(binding.language, "english");
        assert_eq!(binding.route, SttRoute::Deepgram { code: "en".into() });
    }

    #[test]
    fn test_supported_languages_complete() {
        let langs = supported_languages();
        assert_eq!(langs.len(), DEEPGRAM_LANGUAGES.len() + GROQ_LANGUAGES.len());
        assert!(langs.contains(&"ukrainian"));
        assert!(langs.contains(&"portuguese"));
    }
}
