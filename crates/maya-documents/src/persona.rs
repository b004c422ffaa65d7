//! The persona document — a free-form JSON profile persisted at a fixed path.
//!
//! Latitude and Longitude are system-owned: the model-driven update path must
//! never change them, so `replace_from_model` restores them from the
//! persisted document before writing.

use std::path::PathBuf;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use maya_core::error::Result;

/// Fields owned by the system rather than the language model.
const SYSTEM_FIELDS: &[&str] = &["Latitude", "Longitude"];

pub struct PersonaStore {
    path: PathBuf,
}

impl PersonaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The all-empty persona shape.
    pub fn template() -> Value {
        json!({
            "Name": "",
            "Age": null,
            "DateOfBirth": "",
            "Gender": "",
            "OriginCountry": "",
            "Education": "",
            "Languages": [],
            "ProfessionalSkills": [],
            "GeneralHealth": "",
            "MedicalConditions": "",
            "StressLevel": "",
            "DesiredProfession": "",
            "Latitude": null,
            "Longitude": null
        })
    }

    /// Load the document. Absent or corrupt files yield the empty template.
    pub async fn load(&self) -> Value {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(value) => value,
                Err(e) => {
                    warn!(path = %self.path.display(), %e, "Invalid persona JSON, using template");
                    Self::template()
                }
            },
            Err(_) => Self::template(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Fully replace the persisted document. Atomic write via temp + rename.
    pub async fn replace(&self, doc: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Persona document written");
        Ok(())
    }

    /// Replace the document with a model-produced revision, restoring the
    /// system-owned location fields from the currently persisted state.
    pub async fn replace_from_model(&self, mut doc: Value) -> Result<()> {
        let current = self.load().await;
        if let Some(map) = doc.as_object_mut() {
            for field in SYSTEM_FIELDS {
                let persisted = current.get(*field).cloned().unwrap_or(Value::Null);
                map.insert((*field).to_string(), persisted);
            }
        }
        self.replace(&doc).await
    }

    /// Set the system-owned location fields.
    pub async fn set_location(&self, latitude: f64, longitude: f64) -> Result<()> {
        let mut doc = self.load().await;
        if let Some(map) = doc.as_object_mut() {
            map.insert("Latitude".into(), json!(latitude));
            map.insert("Longitude".into(), json!(longitude));
        }
        self.replace(&doc).await
    }

    /// Clear the document shape-preservingly and persist the result.
    /// Returns the document as it was before clearing.
    pub async fn clear(&self) -> Result<Value> {
        let doc = self.load().await;
        self.replace(&clear_structure(&doc)).await?;
        Ok(doc)
    }
}

/// Empty every value but keep the structure: strings become "", numbers
/// become null, lists empty, booleans false, objects recurse.
pub fn clear_structure(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleared: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), clear_structure(v)))
                .collect();
            Value::Object(cleared)
        }
        Value::Array(_) => Value::Array(vec![]),
        Value::String(_) => Value::String(String::new()),
        Value::Number(_) => Value::Null,
        Value::Bool(_) => Value::Bool(false),
        Value::Null => Value::Null,
    }
}
