//! Chat endpoint
//!
//! `POST /get` accepts the user message, optional resource identifiers, and
//! zero or more file parts, then drives the orchestrator and returns the
//! assistant's reply together with the (possibly fresh) identifiers.
//!
//! The endpoint accepts both `multipart/form-data` (with files) and
//! `application/x-www-form-urlencoded` (text fields only). On the wire the
//! literal string `"null"` means "create a new resource"; internally that
//! sentinel becomes `Option::None` right here at the boundary.

use crate::error::AppError;
use crate::services::uploads::{self, StoredUpload, UploadStore};
use crate::state::SharedState;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Text fields of a chat request
#[derive(Debug, Default, Deserialize)]
pub struct ChatForm {
    /// User message (required)
    pub msg: Option<String>,
    /// Thread to continue, or the `"null"` sentinel
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    /// Assistant to use, or the `"null"` sentinel
    #[serde(rename = "assistantId")]
    pub assistant_id: Option<String>,
}

/// Response payload for a completed chat request
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Latest assistant message text
    pub response: String,
    /// Thread id to send with the next request
    #[serde(rename = "threadId")]
    pub thread_id: String,
    /// Assistant id to send with the next request
    #[serde(rename = "assistantId")]
    pub assistant_id: String,
}

/// Map the wire sentinel to an absent identifier
fn parse_resource_id(raw: Option<String>) -> Option<String> {
    raw.filter(|value| !value.is_empty() && value != "null")
}

/// Handle `POST /get`
pub async fn chat(
    State(state): State<SharedState>,
    request: Request,
) -> Result<Json<ChatResponse>, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (form, saved_uploads) = if content_type.starts_with("multipart/form-data") {
        read_multipart(&state.uploads, request).await?
    } else {
        let Form(form) = Form::<ChatForm>::from_request(request, &())
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        (form, Vec::new())
    };

    let msg = match form.msg.filter(|m| !m.trim().is_empty()) {
        Some(msg) => msg,
        None => {
            uploads::cleanup(&saved_uploads).await;
            return Err(AppError::MissingMessage);
        }
    };
    let thread_id = parse_resource_id(form.thread_id);
    let assistant_id = parse_resource_id(form.assistant_id);

    info!(
        files = saved_uploads.len(),
        has_thread = thread_id.is_some(),
        has_assistant = assistant_id.is_some(),
        "Chat request received"
    );

    let result = state
        .handler
        .handle(&msg, assistant_id, thread_id, &saved_uploads)
        .await;

    // The orchestrator removes each temp file after successful ingestion;
    // whatever is left over after a failure is removed here.
    if result.is_err() {
        uploads::cleanup(&saved_uploads).await;
    }

    let outcome = result?;
    Ok(Json(ChatResponse {
        response: outcome.response,
        thread_id: outcome.thread_id,
        assistant_id: outcome.assistant_id,
    }))
}

/// Parse a multipart body, saving file parts to the upload directory
async fn read_multipart(
    store: &UploadStore,
    request: Request,
) -> Result<(ChatForm, Vec<StoredUpload>), AppError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut form = ChatForm::default();
    let mut saved: Vec<StoredUpload> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                uploads::cleanup(&saved).await;
                return Err(AppError::BadRequest(format!(
                    "Failed to read multipart field: {e}"
                )));
            }
        };

        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "msg" => form.msg = Some(read_text_field(field, &saved).await?),
            "threadId" => form.thread_id = Some(read_text_field(field, &saved).await?),
            "assistantId" => form.assistant_id = Some(read_text_field(field, &saved).await?),
            "files" => {
                let original_name = field.file_name().map(|name| name.to_string());
                let data = match field.bytes().await {
                    Ok(data) => data,
                    Err(e) => {
                        uploads::cleanup(&saved).await;
                        return Err(AppError::BadRequest(format!(
                            "Failed to read file field: {e}"
                        )));
                    }
                };

                match original_name {
                    Some(name) => match store.save(&name, &data).await {
                        Ok(stored) => saved.push(stored),
                        Err(e) => {
                            uploads::cleanup(&saved).await;
                            return Err(e);
                        }
                    },
                    None => {
                        warn!("Dropping file part without a filename");
                    }
                }
            }
            other => {
                warn!(field = %other, "Unknown multipart field");
            }
        }
    }

    Ok((form, saved))
}

/// Read one text field, cleaning up saved files if the body stream fails
async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
    saved: &[StoredUpload],
) -> Result<String, AppError> {
    match field.text().await {
        Ok(text) => Ok(text),
        Err(e) => {
            uploads::cleanup(saved).await;
            Err(AppError::BadRequest(format!(
                "Failed to read text field: {e}"
            )))
        }
    }
}
