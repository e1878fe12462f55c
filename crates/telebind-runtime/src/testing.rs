//! In-memory `ApiCaller` for driving the poller in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use telebind_api::{Update, UpdateKind};
use telebind_core::{ApiCaller, ApiError, ApiResult};

/// Answers `getUpdates` from a script of batches and failures, recording
/// every request. Other methods answer from canned results, `true` by default.
///
/// Once the script runs out, `getUpdates` cancels the registered stop token
/// (if any) and never completes, like an idle long poll.
#[derive(Clone, Default)]
pub(crate) struct ScriptedCaller {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    script: Mutex<VecDeque<ApiResult<Value>>>,
    results: Mutex<HashMap<String, ApiResult<Value>>>,
    poll_requests: Mutex<Vec<Value>>,
    methods: Mutex<Vec<String>>,
    stop: Mutex<Option<CancellationToken>>,
}

impl ScriptedCaller {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn batch(self, updates: Vec<Update>) -> Self {
        let batch = serde_json::to_value(updates).unwrap();
        self.inner.script.lock().push_back(Ok(batch));
        self
    }

    pub(crate) fn failure(self, error: ApiError) -> Self {
        self.inner.script.lock().push_back(Err(error));
        self
    }

    /// Canned answer for a method other than `getUpdates`.
    pub(crate) fn respond(self, method: &str, result: ApiResult<Value>) -> Self {
        self.inner.results.lock().insert(method.to_string(), result);
        self
    }

    pub(crate) fn stop_when_exhausted(&self, token: CancellationToken) {
        *self.inner.stop.lock() = Some(token);
    }

    /// The `offset` of every `getUpdates` call, in order.
    pub(crate) fn offsets(&self) -> Vec<i64> {
        self.inner
            .poll_requests
            .lock()
            .iter()
            .map(|params| params["offset"].as_i64().unwrap())
            .collect()
    }

    pub(crate) fn requests(&self) -> Vec<Value> {
        self.inner.poll_requests.lock().clone()
    }

    /// Every method called, in order.
    pub(crate) fn methods(&self) -> Vec<String> {
        self.inner.methods.lock().clone()
    }
}

#[async_trait]
impl ApiCaller for ScriptedCaller {
    async fn call(&self, method: &str, params: Option<Value>) -> ApiResult<Value> {
        self.inner.methods.lock().push(method.to_string());

        if method != "getUpdates" {
            let canned = self.inner.results.lock().get(method).cloned();
            return canned.unwrap_or(Ok(Value::Bool(true)));
        }

        self.inner
            .poll_requests
            .lock()
            .push(params.unwrap_or_else(|| json!({})));

        let next = self.inner.script.lock().pop_front();
        match next {
            Some(result) => result,
            None => {
                let stop = self.inner.stop.lock().clone();
                if let Some(token) = stop {
                    token.cancel();
                }
                std::future::pending().await
            }
        }
    }
}

pub(crate) fn message_update(id: i64, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": id,
        "message": {
            "message_id": id,
            "date": 0,
            "chat": {"id": 99, "type": "private"},
            "from": {"id": 99, "is_bot": false, "first_name": "Ada"},
            "text": text
        }
    }))
    .unwrap()
}

pub(crate) fn unknown_update(id: i64) -> Update {
    Update::new(id, UpdateKind::Unknown(json!({"inline_query": {"id": "q"}})))
}
