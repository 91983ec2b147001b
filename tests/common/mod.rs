#![allow(dead_code)]

use objgen::{ObjgenClient, ProgressReporter, WaitOptions};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{MockServer, Request, ResponseTemplate};

pub const OBJECT_ID: &str = "obj_123";

/// Records ticks and whether the ticker task has finished.
#[derive(Default)]
pub struct RecordingProgress {
    ticks: AtomicUsize,
    finished: AtomicBool,
}

impl RecordingProgress {
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for RecordingProgress {
    fn tick(&self, _elapsed: Duration) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

pub fn client_for(server: &MockServer) -> (ObjgenClient, Arc<RecordingProgress>) {
    let progress = Arc::new(RecordingProgress::default());
    let client = ObjgenClient::new_with_url(&server.uri())
        .unwrap()
        .with_progress(progress.clone());
    (client, progress)
}

pub fn fast_wait() -> WaitOptions {
    WaitOptions::default()
        .per_request_timeout(Duration::from_secs(1))
        .absent_retry_delay(Duration::from_millis(20))
        .tick_interval(Duration::from_millis(5))
}

/// A successful wait response whose state holds the given tasks.
pub fn object_state(tasks: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": { "id": OBJECT_ID, "tasks": tasks }
    }))
}

/// Replays a fixed list of responses, repeating the last one once exhausted.
pub struct SequenceResponder {
    responses: Vec<ResponseTemplate>,
    calls: AtomicUsize,
}

impl SequenceResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty());
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }
}

impl wiremock::Respond for SequenceResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

pub async fn requests_to(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}
