use crate::error::ObjgenError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// The `props` object shared by generation requests and debug registrations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ObjectProps {
    pub object_name: String,
    pub object_description: String,
}

/// (Internal) Body of `POST /generations`.
#[derive(Serialize, Debug)]
pub(crate) struct GenerationRequest<'a> {
    pub(crate) version: &'a str,
    #[serde(rename = "languageModel")]
    pub(crate) language_model: &'a str,
    pub(crate) props: ObjectProps,
}

/// Identifies one generation attempt for an object.
///
/// The `id` is assigned by the server, the `version` is chosen by the client
/// when the generation is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMetadata {
    /// Server-assigned object id.
    pub id: String,
    /// Client-generated version token.
    pub version: String,
    pub name: String,
    pub description: String,
}

impl ObjectMetadata {
    pub fn props(&self) -> ObjectProps {
        ObjectProps {
            object_name: self.name.clone(),
            object_description: self.description.clone(),
        }
    }
}

/// Lifecycle state of a version's task, as reported by the server.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The generation is still running.
    Processing,
    /// The generation finished and its content can be fetched.
    Succeeded,
    /// The generation finished with an error.
    Failed,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// The server's record of one generation attempt.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VersionTask {
    pub version: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VersionTask {
    /// Reads one entry of `tasks`, or `None` when it has no string `version`.
    ///
    /// A missing or non-string `status` reads as [`TaskStatus::Unknown`] and a
    /// non-string `error` is rendered as JSON text.
    fn from_value(value: &Value) -> Option<Self> {
        let version = value.get("version")?.as_str()?.to_string();
        let status = value
            .get("status")
            .filter(|s| s.is_string())
            .and_then(|s| TaskStatus::deserialize(s).ok())
            .unwrap_or(TaskStatus::Unknown);
        let error = value.get("error").and_then(render_error);
        Some(Self {
            version,
            status,
            error,
        })
    }
}

/// The object state returned by `GET /objects/{id}`.
///
/// Only `tasks` is interpreted; every other field is kept in `extra` so the
/// state can be handed back to callers untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ObjectState {
    #[serde(default, deserialize_with = "lenient_tasks")]
    pub tasks: Vec<VersionTask>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ObjectState {
    /// Finds the task recorded for `version`, if the server has attached one yet.
    pub fn task(&self, version: &str) -> Option<&VersionTask> {
        self.tasks.iter().find(|t| t.version == version)
    }

    /// The known status of `version`'s task. Unknown statuses read as `None`.
    pub fn version_status(&self, version: &str) -> Option<TaskStatus> {
        self.task(version)
            .map(|t| t.status)
            .filter(|s| *s != TaskStatus::Unknown)
    }
}

/// Reads `tasks` one entry at a time so a malformed record only hides itself.
fn lenient_tasks<'de, D>(deserializer: D) -> Result<Vec<VersionTask>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries.iter().filter_map(VersionTask::from_value).collect())
}

/// Renders a server `error` field as text. Null and empty strings carry no message.
fn render_error(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A downloaded version artifact.
#[derive(Debug, Clone)]
pub struct ObjectContent {
    pub bytes: Vec<u8>,
    /// The `Content-Type` header of the response, if any.
    pub content_type: Option<String>,
}

impl ObjectContent {
    /// File extension matching the content type, `bin` when it is unknown.
    pub fn file_extension(&self) -> &'static str {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .and_then(|essence| mime_guess::get_mime_extensions_str(essence.trim()))
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin")
    }

    /// Writes the content to `dest_dir` as `<id>-<version>.<ext>`.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Returns
    ///
    /// The path of the written file.
    pub async fn save<P: AsRef<Path>>(
        &self,
        object: &ObjectMetadata,
        dest_dir: P,
    ) -> Result<PathBuf, ObjgenError> {
        let file_name = format!("{}-{}.{}", object.id, object.version, self.file_extension());
        let file_path = dest_dir.as_ref().join(file_name);

        fs::create_dir_all(dest_dir.as_ref()).await?;
        let mut file = fs::File::create(&file_path).await?;
        file.write_all(&self.bytes).await?;
        file.flush().await?;

        Ok(file_path)
    }
}

/// Body of `POST /_debug_add_prog_obj_rooms`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DebugRoomRegistration {
    pub props: ObjectProps,
    /// Where the registered object's content can be downloaded.
    pub url: String,
}

impl DebugRoomRegistration {
    pub fn for_object(object: &ObjectMetadata, url: impl Into<String>) -> Self {
        Self {
            props: object.props(),
            url: url.into(),
        }
    }
}

/// Tuning for [`ObjgenClient::wait_until_final`](crate::ObjgenClient::wait_until_final).
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// How long the server may hold each `wait=true` request.
    pub per_request_timeout: Duration,
    /// Bound on the whole wait loop. `None` waits forever.
    pub overall_timeout: Option<Duration>,
    /// Pause before polling again when the version has no task yet.
    pub absent_retry_delay: Duration,
    /// How often the progress reporter is ticked.
    pub tick_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            per_request_timeout: Duration::from_secs(30),
            overall_timeout: Some(Duration::from_secs(10 * 60)),
            absent_retry_delay: Duration::from_millis(100),
            tick_interval: Duration::from_millis(200),
        }
    }
}

impl WaitOptions {
    pub fn per_request_timeout(mut self, timeout: Duration) -> Self {
        self.per_request_timeout = timeout;
        self
    }

    pub fn overall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn absent_retry_delay(mut self, delay: Duration) -> Self {
        self.absent_retry_delay = delay;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// (Internal) The `{success, data, error}` envelope wrapping every JSON response.
#[derive(Debug, Deserialize, Default)]
pub(crate) struct ApiEnvelope {
    #[serde(default)]
    pub(crate) success: bool,
    #[serde(default)]
    pub(crate) data: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<Value>,
}

impl ApiEnvelope {
    /// The envelope's `error` field rendered as text.
    pub(crate) fn error_message(&self) -> Option<String> {
        self.error.as_ref().and_then(render_error)
    }
}
