use crate::error::ObjgenError;
use crate::progress::{ConsoleProgress, ProgressReporter, TickerHandle};
use crate::types::{
    ApiEnvelope, DebugRoomRegistration, GenerationRequest, ObjectContent, ObjectMetadata,
    ObjectProps, ObjectState, TaskStatus, WaitOptions,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_API_URL: &str = "https://40001.cch137.com/obj-dsgn";

/// Language model used by the smoke run when none is given.
pub const DEFAULT_LANGUAGE_MODEL: &str = "gemini-3-flash-preview";

/// Transport timeout for every call except the long-poll.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

/// Added on top of the server-side wait so the server times out first.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

const DECODE_SNIPPET_LEN: usize = 200;

/// Generates a version token from the current wall-clock time in milliseconds.
pub fn make_version() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// The main client for the object generation API.
///
/// It holds the shared `reqwest::Client`, the API base URL and the reporter
/// used to show progress while waiting. Cloning is cheap.
#[derive(Clone)]
pub struct ObjgenClient {
    client: reqwest::Client,
    base_url: Url,
    progress: Arc<dyn ProgressReporter>,
}

impl ObjgenClient {
    /// Creates a new `ObjgenClient`.
    ///
    /// The base URL is read from the `OBJGEN_API_BASE_URL` environment variable,
    /// falling back to the public deployment.
    ///
    /// # Errors
    ///
    /// - `ObjgenError::UrlParseFailed` if the configured URL is invalid.
    /// - `ObjgenError::RequestFailed` if the internal HTTP client fails to build.
    pub fn new() -> Result<Self, ObjgenError> {
        let base_url =
            env::var("OBJGEN_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new_with_url(&base_url)
    }

    /// Creates a new `ObjgenClient` with a custom base URL.
    ///
    /// This is useful for testing against a mock server. A trailing slash on
    /// `base_url` is optional.
    pub fn new_with_url(base_url: &str) -> Result<Self, ObjgenError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ObjgenError::InvalidBaseUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            progress: Arc::new(ConsoleProgress::default()),
        })
    }

    /// Replaces the reporter ticked while [`wait_until_final`](Self::wait_until_final) runs.
    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = reporter;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ObjgenError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ObjgenError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of the binary content of one object version.
    pub fn content_url(&self, object_id: &str, version: &str) -> Result<Url, ObjgenError> {
        self.endpoint(&["objects", object_id, "versions", version, "content"])
    }

    /// URL of the rendered snapshot of one object version.
    pub fn snapshot_url(&self, object_id: &str, version: &str) -> Result<Url, ObjgenError> {
        self.endpoint(&["objects", object_id, "versions", version, "snapshot"])
    }

    /// Sends a request whose response is a `{success, data, error}` envelope.
    ///
    /// Error statuses with a non-JSON body are folded into an envelope carrying
    /// the raw text. A success status with a non-JSON body is a decode error.
    async fn send_json(
        &self,
        request: RequestBuilder,
    ) -> Result<(StatusCode, ApiEnvelope), ObjgenError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            let value: Value = serde_json::from_slice(&body).map_err(|_| decode_error(&body))?;
            Ok((status, serde_json::from_value(value)?))
        } else {
            let envelope = serde_json::from_slice(&body).unwrap_or_else(|_| ApiEnvelope {
                error: Some(Value::String(String::from_utf8_lossy(&body).into_owned())),
                ..Default::default()
            });
            Ok((status, envelope))
        }
    }

    /// Submits a new generation for an object.
    ///
    /// A fresh version token is generated for the attempt and returned in the
    /// resulting [`ObjectMetadata`] together with the server-assigned id.
    ///
    /// # Errors
    ///
    /// `ObjgenError::Request` if the status is not 200, the envelope reports
    /// failure, or `data.id` is missing or not a string.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        model: &str,
    ) -> Result<ObjectMetadata, ObjgenError> {
        let version = make_version();
        info!(
            "[1/5] create generation  name={:?}  version={}  model={}",
            name, version, model
        );

        let url = self.endpoint(&["generations"])?;
        let request_body = GenerationRequest {
            version: &version,
            language_model: model,
            props: ObjectProps {
                object_name: name.to_string(),
                object_description: description.to_string(),
            },
        };

        let (status, envelope) = self
            .send_json(self.client.post(url).json(&request_body))
            .await?;
        if status != StatusCode::OK || !envelope.success {
            return Err(request_error(status, &envelope, "Failed to create generation"));
        }

        let id = envelope
            .data
            .as_ref()
            .and_then(|data| data.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| ObjgenError::Request {
                status: status.as_u16(),
                message: "created generation id is missing or not a string".to_string(),
            })?
            .to_string();

        info!("      created task id={}", id);
        Ok(ObjectMetadata {
            id,
            version,
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    /// Long-polls an object until `version`'s task is final.
    ///
    /// Each round trip asks the server to hold the request for up to
    /// `options.per_request_timeout`. The loop ends when the task succeeds
    /// (returning the whole object state), fails, the object disappears, or
    /// `options.overall_timeout` has elapsed. The configured progress reporter
    /// is ticked while waiting and always stopped before this returns.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use objgen::{ObjgenClient, WaitOptions};
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// let client = ObjgenClient::new()?;
    /// let object = client.create("jet", "a fighter jet", "gemini-3-flash-preview").await?;
    /// let state = client
    ///     .wait_until_final(&object.id, &object.version, &WaitOptions::default())
    ///     .await?;
    /// println!("{} task(s) recorded", state.tasks.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait_until_final(
        &self,
        object_id: &str,
        version: &str,
        options: &WaitOptions,
    ) -> Result<ObjectState, ObjgenError> {
        info!(
            "[2/5] wait version final (wait-mode)  id={}  version={}  poll_timeout={}s  overall_timeout={}",
            object_id,
            version,
            options.per_request_timeout.as_secs(),
            options
                .overall_timeout
                .map(|t| format!("{}s", t.as_secs()))
                .unwrap_or_else(|| "none".to_string()),
        );

        let started_at = Instant::now();
        let ticker = TickerHandle::start(self.progress.clone(), started_at, options.tick_interval);
        let outcome = self
            .poll_until_final(object_id, version, options, started_at)
            .await;
        ticker.stop().await;
        outcome
    }

    async fn poll_until_final(
        &self,
        object_id: &str,
        version: &str,
        options: &WaitOptions,
        started_at: Instant,
    ) -> Result<ObjectState, ObjgenError> {
        let mut url = self.endpoint(&["objects", object_id])?;
        url.query_pairs_mut()
            .append_pair("wait", "true")
            .append_pair("timeout_sec", &options.per_request_timeout.as_secs().to_string());
        let transport_timeout = options.per_request_timeout + LONG_POLL_GRACE;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            if let Some(limit) = options.overall_timeout {
                if started_at.elapsed() > limit {
                    return Err(ObjgenError::Timeout { limit });
                }
            }

            debug!(%url, attempt, "long-poll");
            let (status, envelope) = self
                .send_json(self.client.get(url.clone()).timeout(transport_timeout))
                .await?;

            if status == StatusCode::NOT_FOUND {
                return Err(ObjgenError::NotFound {
                    message: envelope
                        .error_message()
                        .unwrap_or_else(|| "Object not found".to_string()),
                });
            }
            if status != StatusCode::OK || !envelope.success {
                return Err(request_error(status, &envelope, "Wait failed"));
            }

            let state: ObjectState =
                serde_json::from_value(envelope.data.unwrap_or(Value::Null))?;

            match state.version_status(version) {
                None | Some(TaskStatus::Unknown) => {
                    if let Some(task) = state.task(version) {
                        warn!(version, status = ?task.status, "unrecognised task status");
                    }
                    info!(
                        "      poll#{:02}: version task not found yet; continue waiting",
                        attempt
                    );
                    sleep(options.absent_retry_delay).await;
                }
                Some(TaskStatus::Processing) => {
                    info!("      poll#{:02}: status=processing; continue waiting", attempt);
                }
                Some(TaskStatus::Failed) => {
                    let message = state
                        .task(version)
                        .and_then(|t| t.error.clone())
                        .unwrap_or_else(|| "Generation failed".to_string());
                    return Err(ObjgenError::GenerationFailed { message });
                }
                Some(TaskStatus::Succeeded) => {
                    info!(
                        "      done after {:.1}s  status=succeeded",
                        started_at.elapsed().as_secs_f64()
                    );
                    return Ok(state);
                }
            }
        }
    }

    /// Downloads the binary content (a GLB model) of one object version.
    ///
    /// # Errors
    ///
    /// `ObjgenError::Request` for any non-success status, carrying the server's
    /// `error` message when the body is a JSON envelope, else the raw body text.
    pub async fn fetch_content(
        &self,
        object_id: &str,
        version: &str,
    ) -> Result<ObjectContent, ObjgenError> {
        info!("[4/5] fetch glb content  id={}  version={}", object_id, version);
        let url = self.content_url(object_id, version)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error_message())
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(ObjgenError::Request {
                status: status.as_u16(),
                message,
            });
        }

        Ok(ObjectContent {
            bytes: body.to_vec(),
            content_type,
        })
    }

    /// Registers a generated object with the debug rooms endpoint.
    pub async fn register_debug(
        &self,
        registration: &DebugRoomRegistration,
    ) -> Result<(), ObjgenError> {
        info!("[5/5] debug add to rooms");
        let url = self.endpoint(&["_debug_add_prog_obj_rooms"])?;
        let (status, envelope) = self
            .send_json(self.client.post(url).json(registration))
            .await?;
        if status != StatusCode::OK || !envelope.success {
            return Err(request_error(status, &envelope, "debug add failed"));
        }
        info!("      ok");
        Ok(())
    }
}

fn request_error(status: StatusCode, envelope: &ApiEnvelope, context: &str) -> ObjgenError {
    ObjgenError::Request {
        status: status.as_u16(),
        message: envelope
            .error_message()
            .unwrap_or_else(|| format!("{} (HTTP {})", context, status)),
    }
}

fn decode_error(body: &[u8]) -> ObjgenError {
    let end = body.len().min(DECODE_SNIPPET_LEN);
    ObjgenError::Decode {
        snippet: String::from_utf8_lossy(&body[..end]).into_owned(),
    }
}
