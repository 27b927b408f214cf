//! 测试用传输层：记录请求并按顺序返回预设响应

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PushError, Result};
use crate::transport::HttpTransport;

/// 已记录的请求
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
    pub file: Option<(String, PathBuf)>,
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<Result<String>>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个成功响应
    pub fn respond(self, body: impl Into<String>) -> Self {
        self.lock().responses.push_back(Ok(body.into()));
        self
    }

    /// 追加一个失败响应
    pub fn fail(self, err: PushError) -> Self {
        self.lock().responses.push_back(Err(err));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// 最后一个请求的 JSON 请求体
    pub fn last_body(&self) -> Option<Value> {
        self.lock().requests.last().and_then(|r| r.body.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, request: RecordedRequest) -> Result<String> {
        let mut state = self.lock();
        state.requests.push(request);
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(PushError::NetworkError("no canned response".to_string())))
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<String> {
        self.record(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            body: None,
            file: None,
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<String> {
        self.record(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            body: Some(body.clone()),
            file: None,
        })
    }

    async fn post_file(&self, url: &str, field_name: &str, path: &Path) -> Result<String> {
        self.record(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            body: None,
            file: Some((field_name.to_string(), path.to_path_buf())),
        })
    }
}
