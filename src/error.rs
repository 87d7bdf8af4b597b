//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP
//! responses. All errors implement `IntoResponse` so every stage failure
//! produces a defined JSON body instead of a hung connection.

use crate::provider::types::RunStatus;
use crate::provider::ProviderError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// The required `msg` field was absent or empty
    #[error("Message is required")]
    MissingMessage,

    /// Request body could not be decoded (multipart or urlencoded)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Assistant creation was rejected by the provider
    #[error("Error creating assistant: {0}")]
    AssistantProvisioning(#[source] ProviderError),

    /// Thread creation was rejected by the provider
    #[error("Error creating thread: {0}")]
    ThreadProvisioning(#[source] ProviderError),

    /// Any other provider operation failed (ingestion, attachment, messaging,
    /// run start, polling, message fetch)
    #[error("Provider request failed: {0}")]
    Provider(#[from] ProviderError),

    /// A stored upload could not be read back for ingestion
    #[error("Failed to read uploaded file {path}: {source}")]
    UploadRead {
        path: String,
        source: std::io::Error,
    },

    /// An incoming file part could not be written to the upload directory
    #[error("Failed to store uploaded file: {0}")]
    UploadWrite(std::io::Error),

    /// Poll cap was reached before the run completed
    #[error("Run {run_id} did not complete after {attempts} status checks")]
    RunPollTimeout { run_id: String, attempts: u32 },

    /// The run reached a terminal failure state (only reported when
    /// `fail_on_terminal` is enabled)
    #[error("Run {run_id} ended with status {status:?}")]
    RunFailed { run_id: String, status: RunStatus },

    /// The run completed but the thread had no readable assistant message
    #[error("Thread has no assistant response")]
    EmptyThread,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MissingMessage | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            // Provisioning failures surface only a generic body on the wire.
            AppError::AssistantProvisioning(cause) | AppError::ThreadProvisioning(cause) => {
                tracing::error!(error = %cause, "Resource provisioning failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::RunPollTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            AppError::RunFailed { .. } | AppError::EmptyThread => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Provider(_) | AppError::UploadRead { .. } | AppError::UploadWrite(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
