//! Location-based recommendations: validate the persona, reverse-geocode the
//! stored coordinates, and hand the enriched profile to the search-grounded
//! generation call.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::state::AppState;

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    #[serde(default)]
    address: Option<GeocodeAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct GeocodeAddress {
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    province: Option<String>,
    #[serde(default)]
    county: Option<String>,
}

impl GeocodeAddress {
    fn region(&self) -> Option<String> {
        self.state
            .clone()
            .or_else(|| self.province.clone())
            .or_else(|| self.county.clone())
    }
}

/// Reverse-geocode coordinates to (country, state-or-equivalent).
pub async fn reverse_geocode(
    client: &reqwest::Client,
    latitude: f64,
    longitude: f64,
) -> anyhow::Result<(Option<String>, Option<String>)> {
    let lat = latitude.to_string();
    let lon = longitude.to_string();
    let resp = client
        .get(NOMINATIM_URL)
        .query(&[
            ("format", "jsonv2"),
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("accept-language", "en"),
        ])
        .send()
        .await?;

    if !resp.status().is_success() {
        anyhow::bail!("reverse geocoding failed with status {}", resp.status());
    }

    let parsed: ReverseGeocodeResponse = resp.json().await?;
    let address = parsed
        .address
        .ok_or_else(|| anyhow::anyhow!("reverse geocoding returned no address"))?;
    Ok((address.country.clone(), address.region()))
}

/// Required persona fields that are missing or empty.
fn missing_fields(doc: &Value) -> Vec<&'static str> {
    let mut missing = Vec::new();

    if doc.get("Latitude").is_none_or(Value::is_null) {
        missing.push("Latitude");
    }
    if doc.get("Longitude").is_none_or(Value::is_null) {
        missing.push("Longitude");
    }
    if doc
        .get("Name")
        .and_then(Value::as_str)
        .is_none_or(str::is_empty)
    {
        missing.push("Name");
    }
    let languages_empty = match doc.get("Languages") {
        Some(Value::Array(list)) => list.is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        _ => true,
    };
    if languages_empty {
        missing.push("Languages");
    }

    missing
}

pub async fn recommendation(State(state): State<Arc<AppState>>) -> Response {
    if !state.persona.exists() {
        return Json(json!({
            "error": format!(
                "File not found: {}",
                state.config.storage.persona_path.display()
            )
        }))
        .into_response();
    }

    let doc = state.persona.load().await;

    let missing = missing_fields(&doc);
    if !missing.is_empty() {
        debug!(?missing, "Recommendation request rejected");
        return Json(json!({
            "error": "Please make sure you have given location access to Maya and provided basic details like name and the languages you speak"
        }))
        .into_response();
    }

    // Presence checked above.
    let latitude = doc["Latitude"].as_f64().unwrap_or_default();
    let longitude = doc["Longitude"].as_f64().unwrap_or_default();

    let (country, region) = match reverse_geocode(&state.geocoder, latitude, longitude).await {
        Ok(address) => address,
        Err(e) => {
            error!(%e, "Reverse geocoding failed");
            return Json(json!({"error": "Could not retrieve location data"})).into_response();
        }
    };

    let mut profile = doc;
    if let Some(map) = profile.as_object_mut() {
        map.insert("Country".into(), json!(country));
        map.insert("State".into(), json!(region));
        // The model gets the resolved location, never the raw coordinates.
        map.remove("Latitude");
        map.remove("Longitude");
    }

    match state.chat.recommendations(&profile).await {
        Ok(text) => Json(Value::String(text)).into_response(),
        Err(e) => {
            error!(%e, "Recommendation generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": format!("An error occurred: {e}")})),
            )
                .into_response()
        }
    }
}
