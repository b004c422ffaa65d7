//! Hearing-form PDF filling.
//!
//! The fillable template carries an AcroForm whose field names match the
//! form-fill dictionary keys; filling sets each field's `/V` and lets the
//! viewer regenerate appearances.

use std::path::{Path, PathBuf};

use lopdf::{Document, Object};
use tracing::{debug, info};

use maya_core::error::{MayaError, Result};
use maya_core::form::FormFill;

/// Fill the AcroForm template with the collected form values and save it to
/// `output`. Returns the output path. Blocking; call from a blocking context.
pub fn fill_form_pdf(form: &FormFill, template: &Path, output: &Path) -> Result<PathBuf> {
    if !template.is_file() {
        return Err(MayaError::Document(format!(
            "Could not find the form PDF: {}",
            template.display()
        )));
    }

    let mut doc =
        Document::load(template).map_err(|e| MayaError::Document(e.to_string()))?;

    set_need_appearances(&mut doc);

    let mut filled = 0;
    let ids: Vec<lopdf::ObjectId> = doc.objects.keys().copied().collect();
    for id in ids {
        let Some(Object::Dictionary(dict)) = doc.objects.get_mut(&id) else {
            continue;
        };
        let Ok(name_bytes) = dict.get(b"T").and_then(Object::as_str) else {
            continue;
        };
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        if let Some(value) = form.get(&name) {
            if !value.is_empty() {
                dict.set("V", Object::string_literal(value));
                // Drop stale appearance streams so the new value renders.
                dict.remove(b"AP");
                filled += 1;
            }
        }
    }
    debug!(filled, "Form fields written");

    doc.save(output)
        .map_err(|e| MayaError::Document(e.to_string()))?;
    info!(path = %output.display(), "Filled form saved");
    Ok(output.to_path_buf())
}

/// Ask viewers to regenerate field appearances from the new values.
fn set_need_appearances(doc: &mut Document) {
    let acroform_id = doc
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .and_then(|obj| obj.as_reference().ok());

    if let Some(id) = acroform_id {
        if let Ok(dict) = doc.get_object_mut(id).and_then(Object::as_dict_mut) {
            dict.set("NeedAppearances", Object::Boolean(true));
        }
    }
}
