//! Request orchestration
//!
//! One `AssistantRequestHandler` executes four sequential stages per chat
//! request:
//!
//! 1. File ingestion - upload every stored file to the provider, deleting the
//!    local copy after each successful upload.
//! 2. Resource provisioning - lazily create the assistant and the thread when
//!    the caller did not supply identifiers (assistant first; a failure here
//!    aborts before the thread is touched).
//! 3. Attachment - associate every ingested file with the assistant, one call
//!    per file, in ingestion order.
//! 4. Execution and polling - append the user message, start a run, poll its
//!    status at a fixed interval until `completed`, then read back the latest
//!    message.
//!
//! The polling behavior is a policy, not a hardcoded loop: by default the
//! handler polls indefinitely and treats every non-`completed` status as
//! "not yet done". A poll cap and terminal failure detection can be switched
//! on through configuration.

use crate::error::AppError;
use crate::provider::types::{AssistantTool, CreateAssistantRequest, RunStatus};
use crate::provider::ProviderClient;
use crate::services::uploads::StoredUpload;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// Name given to lazily created assistants
const ASSISTANT_NAME: &str = "File Assistant";

/// Instruction text given to lazily created assistants
const ASSISTANT_INSTRUCTIONS: &str = "As an AI assistant, your role is to analyze and respond \
    to user inquiries or requests by utilizing the information contained within the provided files.";

/// Capability set given to lazily created assistants
const ASSISTANT_TOOLS: [&str; 2] = ["code_interpreter", "retrieval"];

/// How the run-status loop behaves
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Wait between consecutive status checks
    pub interval: Duration,
    /// Give up after this many checks; `None` polls until the run completes
    pub max_attempts: Option<u32>,
    /// Report failed/cancelled/expired runs as errors instead of polling on
    pub fail_on_terminal: bool,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: None,
            fail_on_terminal: false,
        }
    }
}

/// Result of one fully processed chat request
#[derive(Debug)]
pub struct ChatOutcome {
    /// Latest assistant message text
    pub response: String,
    /// Thread the conversation ran on (echoed back for reuse)
    pub thread_id: String,
    /// Assistant the run used (echoed back for reuse)
    pub assistant_id: String,
}

/// The per-request orchestration component
///
/// Holds the provider client, the model for lazy assistant creation, and the
/// polling policy. Stateless across requests; identifiers live with the
/// caller.
#[derive(Debug, Clone)]
pub struct AssistantRequestHandler {
    client: ProviderClient,
    model: String,
    poll: PollPolicy,
}

impl AssistantRequestHandler {
    pub fn new(client: ProviderClient, model: String, poll: PollPolicy) -> Self {
        Self {
            client,
            model,
            poll,
        }
    }

    /// Run all four stages for one request
    ///
    /// # Arguments
    /// * `msg` - User message text
    /// * `assistant_id` - Caller-supplied assistant, or `None` to create one
    /// * `thread_id` - Caller-supplied thread, or `None` to create one
    /// * `uploads` - Files already saved to the upload directory
    pub async fn handle(
        &self,
        msg: &str,
        assistant_id: Option<String>,
        thread_id: Option<String>,
        uploads: &[StoredUpload],
    ) -> Result<ChatOutcome, AppError> {
        let file_ids = self.ingest_files(uploads).await?;
        let assistant_id = self.ensure_assistant(assistant_id).await?;
        let thread_id = self.ensure_thread(thread_id).await?;
        self.attach_files(&assistant_id, &file_ids).await?;
        let response = self.execute_and_poll(&assistant_id, &thread_id, msg).await?;

        Ok(ChatOutcome {
            response,
            thread_id,
            assistant_id,
        })
    }

    /// Stage 1: upload every stored file, collecting provider file ids
    ///
    /// Each local copy is deleted right after its successful upload; a
    /// deletion failure is logged and does not affect the response.
    async fn ingest_files(&self, uploads: &[StoredUpload]) -> Result<Vec<String>, AppError> {
        let mut file_ids = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let data = fs::read(&upload.path).await.map_err(|e| AppError::UploadRead {
                path: upload.path.display().to_string(),
                source: e,
            })?;

            let file = self.client.upload_file(&upload.original_name, data).await?;
            info!(
                file_id = %file.id,
                original_name = %upload.original_name,
                "Ingested file"
            );
            file_ids.push(file.id);

            if let Err(e) = fs::remove_file(&upload.path).await {
                warn!(
                    path = %upload.path.display(),
                    error = %e,
                    "Error deleting file"
                );
            }
        }

        Ok(file_ids)
    }

    /// Stage 2a: return the supplied assistant id or create one lazily
    async fn ensure_assistant(&self, assistant_id: Option<String>) -> Result<String, AppError> {
        if let Some(id) = assistant_id {
            return Ok(id);
        }

        let request = CreateAssistantRequest {
            name: ASSISTANT_NAME.to_string(),
            instructions: ASSISTANT_INSTRUCTIONS.to_string(),
            tools: ASSISTANT_TOOLS.iter().map(|t| AssistantTool::new(t)).collect(),
            model: self.model.clone(),
        };

        let assistant = self
            .client
            .create_assistant(&request)
            .await
            .map_err(AppError::AssistantProvisioning)?;

        info!(assistant_id = %assistant.id, "Created assistant");
        Ok(assistant.id)
    }

    /// Stage 2b: return the supplied thread id or create one lazily
    async fn ensure_thread(&self, thread_id: Option<String>) -> Result<String, AppError> {
        if let Some(id) = thread_id {
            return Ok(id);
        }

        let thread = self
            .client
            .create_thread()
            .await
            .map_err(AppError::ThreadProvisioning)?;

        info!(thread_id = %thread.id, "Created thread");
        Ok(thread.id)
    }

    /// Stage 3: associate every ingested file with the assistant
    async fn attach_files(&self, assistant_id: &str, file_ids: &[String]) -> Result<(), AppError> {
        for file_id in file_ids {
            self.client.attach_file(assistant_id, file_id).await?;
            debug!(
                assistant_id = %assistant_id,
                file_id = %file_id,
                "Attached file to assistant"
            );
        }
        Ok(())
    }

    /// Stage 4: post the message, start a run, poll it, read the reply
    async fn execute_and_poll(
        &self,
        assistant_id: &str,
        thread_id: &str,
        msg: &str,
    ) -> Result<String, AppError> {
        self.client.create_message(thread_id, msg).await?;
        let run = self.client.create_run(thread_id, assistant_id).await?;
        info!(run_id = %run.id, thread_id = %thread_id, "Run started");

        let mut attempts: u32 = 0;
        loop {
            let current = self.client.retrieve_run(thread_id, &run.id).await?;
            match current.status {
                RunStatus::Completed => break,
                status if self.poll.fail_on_terminal && status.is_terminal_failure() => {
                    return Err(AppError::RunFailed {
                        run_id: run.id,
                        status,
                    });
                }
                status => {
                    debug!(run_id = %run.id, status = ?status, "Run is not completed yet");
                }
            }

            attempts += 1;
            if let Some(max) = self.poll.max_attempts {
                if attempts >= max {
                    return Err(AppError::RunPollTimeout {
                        run_id: run.id,
                        attempts,
                    });
                }
            }

            tokio::time::sleep(self.poll.interval).await;
        }

        let messages = self.client.list_messages(thread_id).await?;
        messages
            .data
            .into_iter()
            .next()
            .and_then(|message| message.first_text_value())
            .ok_or(AppError::EmptyThread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::uploads::UploadStore;
    use mockito::{Matcher, Server, ServerGuard};
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_handler(server: &ServerGuard, poll: PollPolicy) -> AssistantRequestHandler {
        let client = ProviderClient::new(reqwest::Client::new(), server.url(), "test-key");
        AssistantRequestHandler::new(client, "gpt-4-1106-preview".to_string(), poll)
    }

    fn fast_poll() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: None,
            fail_on_terminal: false,
        }
    }

    /// Mocks for the execution stage against fixed thread/run ids
    async fn mock_execution(server: &mut ServerGuard, thread_id: &str) -> Vec<mockito::Mock> {
        vec![
            server
                .mock("POST", format!("/threads/{thread_id}/messages").as_str())
                .match_body(Matcher::PartialJson(
                    serde_json::json!({"role": "user", "content": "Hello"}),
                ))
                .with_status(200)
                .with_body(r#"{"id": "msg_user", "object": "thread.message"}"#)
                .create_async()
                .await,
            server
                .mock("POST", format!("/threads/{thread_id}/runs").as_str())
                .with_status(200)
                .with_body(r#"{"id": "run_1", "status": "queued"}"#)
                .create_async()
                .await,
            server
                .mock("GET", format!("/threads/{thread_id}/runs/run_1").as_str())
                .with_status(200)
                .with_body(r#"{"id": "run_1", "status": "completed"}"#)
                .create_async()
                .await,
            server
                .mock("GET", format!("/threads/{thread_id}/messages").as_str())
                .with_status(200)
                .with_body(
                    r#"{"data": [
                        {"id": "msg_2", "role": "assistant",
                         "content": [{"type": "text", "text": {"value": "Hi there", "annotations": []}}]},
                        {"id": "msg_1", "role": "user",
                         "content": [{"type": "text", "text": {"value": "Hello", "annotations": []}}]}
                    ]}"#,
                )
                .create_async()
                .await,
        ]
    }

    #[tokio::test]
    #[serial]
    async fn sentinel_ids_provision_fresh_resources() {
        let mut server = Server::new_async().await;
        let assistant_mock = server
            .mock("POST", "/assistants")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": "File Assistant",
                "model": "gpt-4-1106-preview",
                "tools": [{"type": "code_interpreter"}, {"type": "retrieval"}],
            })))
            .with_status(200)
            .with_body(r#"{"id": "asst_new"}"#)
            .create_async()
            .await;
        let thread_mock = server
            .mock("POST", "/threads")
            .with_status(200)
            .with_body(r#"{"id": "thread_new"}"#)
            .create_async()
            .await;
        let execution_mocks = mock_execution(&mut server, "thread_new").await;

        let handler = test_handler(&server, fast_poll());
        let outcome = handler.handle("Hello", None, None, &[]).await.unwrap();

        assistant_mock.assert_async().await;
        thread_mock.assert_async().await;
        for mock in execution_mocks {
            mock.assert_async().await;
        }
        assert_eq!(outcome.assistant_id, "asst_new");
        assert_eq!(outcome.thread_id, "thread_new");
        assert_eq!(outcome.response, "Hi there");
    }

    #[tokio::test]
    #[serial]
    async fn existing_ids_skip_provisioning() {
        let mut server = Server::new_async().await;
        let assistant_mock = server
            .mock("POST", "/assistants")
            .expect(0)
            .create_async()
            .await;
        let thread_mock = server.mock("POST", "/threads").expect(0).create_async().await;
        let execution_mocks = mock_execution(&mut server, "thread_keep").await;

        let handler = test_handler(&server, fast_poll());
        let outcome = handler
            .handle(
                "Hello",
                Some("asst_keep".to_string()),
                Some("thread_keep".to_string()),
                &[],
            )
            .await
            .unwrap();

        assistant_mock.assert_async().await;
        thread_mock.assert_async().await;
        for mock in execution_mocks {
            mock.assert_async().await;
        }
        assert_eq!(outcome.assistant_id, "asst_keep");
        assert_eq!(outcome.thread_id, "thread_keep");
    }

    #[tokio::test]
    #[serial]
    async fn assistant_failure_aborts_before_thread_creation() {
        let mut server = Server::new_async().await;
        let assistant_mock = server
            .mock("POST", "/assistants")
            .with_status(500)
            .with_body(r#"{"error": {"message": "boom"}}"#)
            .create_async()
            .await;
        let thread_mock = server.mock("POST", "/threads").expect(0).create_async().await;

        let handler = test_handler(&server, fast_poll());
        let result = handler.handle("Hello", None, None, &[]).await;

        assistant_mock.assert_async().await;
        thread_mock.assert_async().await;
        assert!(matches!(
            result.unwrap_err(),
            AppError::AssistantProvisioning(_)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn files_are_ingested_attached_and_removed() {
        let mut server = Server::new_async().await;
        let upload_mock = server
            .mock("POST", "/files")
            .with_status(200)
            .with_body(r#"{"id": "file-xyz"}"#)
            .expect(2)
            .create_async()
            .await;
        let attach_mock = server
            .mock("POST", "/assistants/asst_keep/files")
            .match_body(Matcher::PartialJson(serde_json::json!({"file_id": "file-xyz"})))
            .with_status(200)
            .with_body(r#"{"id": "file-xyz"}"#)
            .expect(2)
            .create_async()
            .await;
        let execution_mocks = mock_execution(&mut server, "thread_keep").await;

        let dir = tempdir().expect("Failed to create temp dir");
        let store = UploadStore::new(dir.path());
        let uploads = vec![
            store.save("a.txt", b"alpha").await.unwrap(),
            store.save("b.txt", b"beta").await.unwrap(),
        ];

        let handler = test_handler(&server, fast_poll());
        let outcome = handler
            .handle(
                "Hello",
                Some("asst_keep".to_string()),
                Some("thread_keep".to_string()),
                &uploads,
            )
            .await
            .unwrap();

        upload_mock.assert_async().await;
        attach_mock.assert_async().await;
        for mock in execution_mocks {
            mock.assert_async().await;
        }
        assert_eq!(outcome.response, "Hi there");
        assert!(!uploads[0].path.exists());
        assert!(!uploads[1].path.exists());
    }

    #[tokio::test]
    #[serial]
    async fn run_transitions_from_in_progress_to_completed() {
        let mut server = Server::new_async().await;
        let execution_base = mock_execution(&mut server, "thread_keep").await;
        // mockito serves the earliest registered mock that still expects
        // hits, so the plain retrieve mock must be removed for the override
        // below to take effect.
        execution_base[2].remove_async().await;

        // Overrides the plain retrieve mock: in_progress twice, then completed.
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_body = calls.clone();
        let retrieve_mock = server
            .mock("GET", "/threads/thread_keep/runs/run_1")
            .with_status(200)
            .with_body_from_request(move |_| {
                let n = calls_in_body.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    br#"{"id": "run_1", "status": "in_progress"}"#.to_vec()
                } else {
                    br#"{"id": "run_1", "status": "completed"}"#.to_vec()
                }
            })
            .expect(3)
            .create_async()
            .await;

        let handler = test_handler(&server, fast_poll());
        let outcome = handler
            .handle(
                "Hello",
                Some("asst_keep".to_string()),
                Some("thread_keep".to_string()),
                &[],
            )
            .await
            .unwrap();

        retrieve_mock.assert_async().await;
        drop(execution_base);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.response, "Hi there");
    }

    #[tokio::test]
    #[serial]
    async fn default_policy_keeps_polling_through_failed_status() {
        // With the default policy a failed run is "not yet done"; a capped
        // policy is used here so the test can observe the repeated polling.
        let mut server = Server::new_async().await;
        let _execution_base = mock_execution(&mut server, "thread_keep").await;
        _execution_base[2].remove_async().await;
        let retrieve_mock = server
            .mock("GET", "/threads/thread_keep/runs/run_1")
            .with_status(200)
            .with_body(r#"{"id": "run_1", "status": "failed"}"#)
            .expect(3)
            .create_async()
            .await;

        let poll = PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: Some(3),
            fail_on_terminal: false,
        };
        let handler = test_handler(&server, poll);
        let result = handler
            .handle(
                "Hello",
                Some("asst_keep".to_string()),
                Some("thread_keep".to_string()),
                &[],
            )
            .await;

        retrieve_mock.assert_async().await;
        match result.unwrap_err() {
            AppError::RunPollTimeout { run_id, attempts } => {
                assert_eq!(run_id, "run_1");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected RunPollTimeout, got: {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn fail_on_terminal_reports_failed_run() {
        let mut server = Server::new_async().await;
        let _execution_base = mock_execution(&mut server, "thread_keep").await;
        _execution_base[2].remove_async().await;
        let retrieve_mock = server
            .mock("GET", "/threads/thread_keep/runs/run_1")
            .with_status(200)
            .with_body(r#"{"id": "run_1", "status": "cancelled"}"#)
            .create_async()
            .await;

        let poll = PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: None,
            fail_on_terminal: true,
        };
        let handler = test_handler(&server, poll);
        let result = handler
            .handle(
                "Hello",
                Some("asst_keep".to_string()),
                Some("thread_keep".to_string()),
                &[],
            )
            .await;

        retrieve_mock.assert_async().await;
        match result.unwrap_err() {
            AppError::RunFailed { status, .. } => assert_eq!(status, RunStatus::Cancelled),
            other => panic!("Expected RunFailed, got: {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn empty_thread_after_completion_is_an_error() {
        let mut server = Server::new_async().await;
        let _execution_base = mock_execution(&mut server, "thread_keep").await;
        _execution_base[3].remove_async().await;
        let _empty_messages = server
            .mock("GET", "/threads/thread_keep/messages")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await;

        let handler = test_handler(&server, fast_poll());
        let result = handler
            .handle(
                "Hello",
                Some("asst_keep".to_string()),
                Some("thread_keep".to_string()),
                &[],
            )
            .await;

        assert!(matches!(result.unwrap_err(), AppError::EmptyThread));
    }
}
