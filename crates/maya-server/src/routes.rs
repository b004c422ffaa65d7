//! HTTP routes for the avatar frontend.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use maya_documents::persona::clear_structure;
use maya_documents::pdf::fill_form_pdf;

use crate::recommend;
use crate::state::AppState;

/// Browser recordings can run long; the default 2 MB body limit is too tight.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/api", get(root))
        .route("/api/transcribe", post(transcribe))
        .route("/api/set-language", post(set_language))
        .route("/api/get-user-persona", get(get_user_persona))
        .route("/api/update-user-persona", post(update_user_persona))
        .route("/api/end-chat", post(end_chat))
        .route("/api/get-pdf", get(get_pdf))
        .route("/api/recommendation", post(recommend::recommendation))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until interrupted.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.bind, state.config.server.port
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Backend listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "Failed to install CTRL+C handler");
    }
    info!("Shutdown signal received");
}

async fn root() -> impl IntoResponse {
    Json(json!({"message": "Hello World!"}))
}

async fn transcribe(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut audio: Option<Vec<u8>> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("audio") {
                    match field.bytes().await {
                        Ok(bytes) => audio = Some(bytes.to_vec()),
                        Err(e) => {
                            return error_detail(
                                StatusCode::BAD_REQUEST,
                                format!("Failed to read audio upload: {e}"),
                            );
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_detail(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid multipart request: {e}"),
                );
            }
        }
    }

    let Some(audio) = audio else {
        return error_detail(StatusCode::BAD_REQUEST, "Missing 'audio' field".into());
    };

    match state.pipeline.run(audio).await {
        Ok(messages) => Json(json!({"messages": messages})).into_response(),
        Err(e) => {
            error!(%e, "Turn pipeline failed");
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct LanguageRequest {
    language: String,
}

async fn set_language(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LanguageRequest>,
) -> Response {
    match maya_core::language::lookup(&request.language) {
        Some(binding) => {
            info!(language = %binding.language, voice = %binding.voice_id, "Language bound");
            state.session.set_binding(binding).await;
            Json(json!({"status": "success"})).into_response()
        }
        None => error_detail(
            StatusCode::BAD_REQUEST,
            format!(
                "Language '{}' is not supported. Supported languages are: {}",
                request.language,
                maya_core::language::supported_languages().join(", ")
            ),
        ),
    }
}

async fn get_user_persona(State(state): State<Arc<AppState>>) -> Response {
    if !state.persona.exists() {
        return Json(json!({})).into_response();
    }
    Json(state.persona.load().await).into_response()
}

#[derive(Debug, Deserialize)]
struct UserPersonaUpdate {
    data: Value,
}

async fn update_user_persona(
    State(state): State<Arc<AppState>>,
    Json(update): Json<UserPersonaUpdate>,
) -> Response {
    match state.persona.replace(&update.data).await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "User persona updated successfully"
        }))
        .into_response(),
        Err(e) => error_detail(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to update user persona: {e}"),
        ),
    }
}

async fn end_chat(State(state): State<Arc<AppState>>) -> Response {
    match end_chat_inner(&state).await {
        Ok(()) => Json(json!({
            "status": "success",
            "message": "Chat ended and data saved to the session sheet"
        }))
        .into_response(),
        Err(e) => {
            error!(%e, "end-chat failed");
            Json(json!({"status": "error", "message": e.to_string()})).into_response()
        }
    }
}

async fn end_chat_inner(state: &Arc<AppState>) -> anyhow::Result<()> {
    let doc = state.persona.load().await;

    let exporter = state.exporter.clone();
    let row = doc.clone();
    tokio::task::spawn_blocking(move || exporter.append(&row)).await??;

    state.persona.replace(&clear_structure(&doc)).await?;
    state.background.cancel_pending().await;
    state.session.reset().await;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct PdfQuery {
    action: String,
}

async fn get_pdf(State(state): State<Arc<AppState>>, Query(query): Query<PdfQuery>) -> Response {
    match query.action.as_str() {
        "show" => show_pdf(&state).await,
        "send" => send_pdf(&state).await,
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error"})),
        )
            .into_response(),
    }
}

async fn show_pdf(state: &Arc<AppState>) -> Response {
    let form = state.session.form_snapshot().await;
    let template = state.config.storage.pdf_template.clone();
    let output = state.config.storage.pdf_output.clone();

    let rendered =
        tokio::task::spawn_blocking(move || fill_form_pdf(&form, &template, &output)).await;

    let path = match rendered {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => {
            error!(%e, "PDF rendering failed");
            return Json(json!({
                "status": "error",
                "message": format!("Failed to process PDF: {e}")
            }))
            .into_response();
        }
        Err(e) => {
            return Json(json!({
                "status": "error",
                "message": format!("Failed to process PDF: {e}")
            }))
            .into_response();
        }
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => Json(json!({
            "status": "success",
            "pdf_data": base64::engine::general_purpose::STANDARD.encode(bytes),
            "pdf_filename": "filled_form.pdf"
        }))
        .into_response(),
        Err(e) => Json(json!({
            "status": "error",
            "message": format!("Failed to process PDF: {e}")
        }))
        .into_response(),
    }
}

async fn send_pdf(state: &Arc<AppState>) -> Response {
    let output = &state.config.storage.pdf_output;
    if !output.exists() {
        return Json(json!({
            "status": "error",
            "message": "No PDF has been generated yet. Please view the PDF first."
        }))
        .into_response();
    }

    let Some(mailer) = &state.mailer else {
        return Json(json!({
            "status": "error",
            "message": "Email is not configured",
            "email_sent": false
        }))
        .into_response();
    };

    match mailer.send_pdf(output).await {
        Ok(()) => Json(json!({
            "status": "success",
            "message": "PDF sent via email",
            "email_sent": true
        }))
        .into_response(),
        Err(e) => {
            error!(%e, "Email dispatch failed");
            Json(json!({
                "status": "error",
                "message": format!("Failed to send PDF via email: {e}"),
                "email_sent": false
            }))
            .into_response()
        }
    }
}

fn error_detail(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({"detail": detail}))).into_response()
}
