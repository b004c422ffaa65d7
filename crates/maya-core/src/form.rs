//! The form-fill dictionary — a fixed schema of hearing-form fields that the
//! background extraction step populates incrementally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field names of the vulnerability-identification form, in render order.
///
/// Text fields come first, then the selection fields, then the Yes-flags.
/// Umlauts are transliterated to plain ASCII to match the PDF template's
/// field names.
pub const FORM_FIELDS: &[&str] = &[
    "Name",
    "Vorname",
    "Geburtsdatum",
    "Geburtsland",
    "Geburtsort",
    "Staatsangehorigkeit",
    "Praktische Hinweise zur Durchfuhrung der Anhorung",
    "Im Auftrag",
    "Geschlecht",
    "Familienstand",
    "korperlich",
    "seelisch",
    "geistig",
    "Sinnesbeeintrachtigung",
    "Alleinerziehende",
    "Schwangere",
    "alter als 65 Jahre",
    "Verlust oder Trennung von engen Familienangehorigen",
    "Soziale Isolation",
    "Erfahrungen mit korperlicher oder seelischer Gewalt wahrend Flucht oder Aufenthalt",
];

/// The one field that is pre-filled in the empty template.
const SENDER_FIELD: (&str, &str) = ("Im Auftrag", "MayaCode");

/// The in-progress form dictionary.
///
/// Invariant: once a field holds a non-empty value, a merge never replaces it
/// with an empty one; only non-empty extracted values overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFill {
    fields: BTreeMap<String, String>,
}

impl Default for FormFill {
    fn default() -> Self {
        Self::template()
    }
}

impl FormFill {
    /// The canonical empty form.
    pub fn template() -> Self {
        let mut fields = BTreeMap::new();
        for name in FORM_FIELDS {
            fields.insert((*name).to_string(), String::new());
        }
        fields.insert(SENDER_FIELD.0.into(), SENDER_FIELD.1.into());
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge an extraction result. Unknown keys and empty values are ignored,
    /// so a field already set can only be overwritten by a new non-empty
    /// value. Returns the number of fields changed.
    pub fn merge(&mut self, updates: &serde_json::Value) -> usize {
        let Some(map) = updates.as_object() else {
            return 0;
        };

        let mut applied = 0;
        for (key, value) in map {
            let Some(text) = value.as_str() else { continue };
            if text.is_empty() {
                continue;
            }
            if let Some(slot) = self.fields.get_mut(key) {
                if slot != text {
                    *slot = text.to_string();
                    applied += 1;
                }
            }
        }
        applied
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.fields).unwrap_or_default()
    }
}
