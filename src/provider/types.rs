//! Wire types for the OpenAI Assistants API
//!
//! Request and response bodies for the eight operations the orchestrator
//! consumes. Response types only carry the fields the core actually reads;
//! everything else the provider returns is ignored during deserialization.

use serde::{Deserialize, Serialize};

/// Request body for `POST /assistants`
#[derive(Debug, Serialize)]
pub struct CreateAssistantRequest {
    pub name: String,
    pub instructions: String,
    pub tools: Vec<AssistantTool>,
    pub model: String,
}

/// A single tool entry in an assistant definition, e.g. `{"type": "retrieval"}`
#[derive(Debug, Serialize)]
pub struct AssistantTool {
    #[serde(rename = "type")]
    pub kind: String,
}

impl AssistantTool {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

/// Request body for `POST /assistants/{assistant_id}/files`
#[derive(Debug, Serialize)]
pub struct CreateAssistantFileRequest {
    pub file_id: String,
}

/// Request body for `POST /threads/{thread_id}/messages`
#[derive(Debug, Serialize)]
pub struct CreateMessageRequest {
    pub role: String,
    pub content: String,
}

/// Request body for `POST /threads/{thread_id}/runs`
#[derive(Debug, Serialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
}

/// Response from `POST /files`
#[derive(Debug, Deserialize)]
pub struct FileObject {
    pub id: String,
}

/// Response from `POST /assistants`
#[derive(Debug, Deserialize)]
pub struct AssistantObject {
    pub id: String,
}

/// Response from `POST /assistants/{assistant_id}/files`
#[derive(Debug, Deserialize)]
pub struct AssistantFileObject {
    pub id: String,
}

/// Response from `POST /threads`
#[derive(Debug, Deserialize)]
pub struct ThreadObject {
    pub id: String,
}

/// Response from run creation and retrieval
#[derive(Debug, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: RunStatus,
}

/// Provider-reported lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    /// Any status value this client does not know about
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Statuses the run can never leave
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Expired)
    }
}

/// Response from `GET /threads/{thread_id}/messages`
#[derive(Debug, Deserialize)]
pub struct MessageList {
    pub data: Vec<MessageObject>,
}

/// A single message in a thread, newest first in list responses
#[derive(Debug, Deserialize)]
pub struct MessageObject {
    pub id: String,
    pub role: String,
    pub content: Vec<MessageContent>,
}

impl MessageObject {
    /// Text value of the first content block, if it is a text block
    pub fn first_text_value(self) -> Option<String> {
        self.content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .map(|text| text.value)
    }
}

/// One content block of a message, e.g. `{"type": "text", "text": {"value": "..."}}`
#[derive(Debug, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
}

/// The text payload of a text content block
#[derive(Debug, Deserialize)]
pub struct TextContent {
    pub value: String,
}
