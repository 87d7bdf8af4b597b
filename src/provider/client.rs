//! OpenAI Assistants API client
//!
//! Direct HTTP client for the provider operations the orchestrator consumes:
//! file upload, assistant/thread creation, file attachment, message creation,
//! run creation/retrieval, and message listing.
//!
//! The base URL is injected at construction so tests can point the client at
//! a mock server.

use crate::provider::types::{
    AssistantFileObject, AssistantObject, CreateAssistantFileRequest, CreateAssistantRequest,
    CreateMessageRequest, CreateRunRequest, FileObject, MessageList, RunObject, ThreadObject,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Header required by the beta Assistants endpoints
const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";
const OPENAI_BETA_VALUE: &str = "assistants=v1";

/// Purpose tag for every ingested file
const FILE_PURPOSE: &str = "assistants";

/// Errors from the provider boundary
#[derive(Error, Debug)]
pub enum ProviderError {
    /// HTTP request could not be sent or the body could not be read
    #[error("Request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider answered 2xx but the body did not match the documented shape
    #[error("Failed to parse provider response: {0}")]
    Decode(String),
}

/// Client for the OpenAI Assistants API
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ProviderClient {
    /// Create a client against the given base URL
    ///
    /// # Arguments
    /// * `http` - Shared reqwest client (connection pooling)
    /// * `base_url` - Provider API root, e.g. `https://api.openai.com/v1`
    /// * `api_key` - Bearer credential
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Upload a file with the fixed `assistants` purpose
    ///
    /// Returns the provider-assigned file id.
    pub async fn upload_file(
        &self,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<FileObject, ProviderError> {
        let part = reqwest::multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", FILE_PURPOSE)
            .part("file", part);

        tracing::debug!(file_name = %file_name, "Uploading file to provider");

        let response = self
            .http
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Create an assistant with the given fixed configuration
    pub async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> Result<AssistantObject, ProviderError> {
        self.post_beta("/assistants".to_string(), request).await
    }

    /// Create an empty conversation thread
    pub async fn create_thread(&self) -> Result<ThreadObject, ProviderError> {
        self.post_beta("/threads".to_string(), &serde_json::json!({}))
            .await
    }

    /// Associate an uploaded file with an assistant
    pub async fn attach_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFileObject, ProviderError> {
        let request = CreateAssistantFileRequest {
            file_id: file_id.to_string(),
        };
        self.post_beta(format!("/assistants/{assistant_id}/files"), &request)
            .await
    }

    /// Append a user message to a thread
    pub async fn create_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let request = CreateMessageRequest {
            role: "user".to_string(),
            content: content.to_string(),
        };
        self.post_beta(format!("/threads/{thread_id}/messages"), &request)
            .await
    }

    /// Start a run of an assistant against a thread
    pub async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<RunObject, ProviderError> {
        let request = CreateRunRequest {
            assistant_id: assistant_id.to_string(),
        };
        self.post_beta(format!("/threads/{thread_id}/runs"), &request)
            .await
    }

    /// Fetch the current state of a run
    pub async fn retrieve_run(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunObject, ProviderError> {
        let response = self
            .http
            .get(format!("{}/threads/{thread_id}/runs/{run_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .header(OPENAI_BETA_HEADER, OPENAI_BETA_VALUE)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// List a thread's messages, newest first
    pub async fn list_messages(&self, thread_id: &str) -> Result<MessageList, ProviderError> {
        let response = self
            .http
            .get(format!("{}/threads/{thread_id}/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .header(OPENAI_BETA_HEADER, OPENAI_BETA_VALUE)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// POST a JSON body to a beta Assistants endpoint
    async fn post_beta<B: Serialize, T: DeserializeOwned>(
        &self,
        path: String,
        body: &B,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header(OPENAI_BETA_HEADER, OPENAI_BETA_VALUE)
            .json(body)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Check the status and parse the body, keeping the raw body in errors
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status_code = status.as_u16(),
                error_body = %body,
                "Provider returned error status"
            );
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Decode(format!("{e} - Response body: {body}")))
    }
}
