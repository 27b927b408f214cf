use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod credential;
pub mod envelope;
pub mod error;
pub mod message;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod transport;
pub mod validate;

pub use credential::{Credential, CredentialCache, CredentialFlags, TokenEndpoint, TokenSource};
pub use envelope::{ResponseEnvelope, WxResponse};
pub use error::{PushError, Result};
pub use transport::{HttpTransport, ReqwestTransport, TransportConfig};

/// 推送成功时的输出前缀
pub const MESSAGE_OK: &str = "ok";

/// 推送结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResult {
    /// 消息ID
    pub message_id: Option<String>,
    /// 响应信息
    pub response: Option<String>,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
}

impl Default for PushResult {
    fn default() -> Self {
        Self {
            message_id: None,
            response: None,
            timestamp: Utc::now(),
        }
    }
}

impl PushResult {
    pub fn with_response(response: impl fmt::Display) -> Self {
        Self {
            response: Some(response.to_string()),
            ..Default::default()
        }
    }

    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        let message_id = message_id.into();
        if !message_id.is_empty() {
            self.message_id = Some(message_id);
        }
        self
    }
}

impl fmt::Display for PushResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.response {
            Some(response) => write!(f, "{MESSAGE_OK}; {response}"),
            None => f.write_str(MESSAGE_OK),
        }
    }
}

/// Webhook 类平台配置trait
pub trait WebhookConfig: Send + Sync {
    /// 获取平台名称
    fn platform_name(&self) -> &str;

    /// 获取webhook URL
    fn webhook_url(&self) -> Result<String>;

    /// 获取密钥
    fn secret(&self) -> Option<&str>;
}

/// 单次命令调用共享的传输层与凭证缓存
pub struct PushContext {
    transport: Box<dyn HttpTransport>,
    credentials: CredentialCache,
}

impl PushContext {
    pub fn new(transport: impl HttpTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            credentials: CredentialCache::new(),
        }
    }

    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    /// 解析凭证来源，必要时请求凭证接口
    pub async fn access_token(
        &self,
        endpoint: &dyn TokenEndpoint,
        source: &TokenSource,
    ) -> Result<String> {
        self.credentials
            .resolve(self.transport(), endpoint, source)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    struct HookConfig;

    impl WebhookConfig for HookConfig {
        fn platform_name(&self) -> &str {
            "mock"
        }

        fn webhook_url(&self) -> Result<String> {
            Ok("https://mock.example.com/webhook".to_string())
        }

        fn secret(&self) -> Option<&str> {
            Some("mock-secret")
        }
    }

    #[test]
    fn test_push_result_display() {
        let result = PushResult::default();
        assert!(result.message_id.is_none());
        assert_eq!(result.to_string(), "ok");

        let result = PushResult::with_response("errcode: 0").message_id("");
        assert!(result.message_id.is_none());
        assert_eq!(result.to_string(), "ok; errcode: 0");

        let result = PushResult::default().message_id("m1");
        assert_eq!(result.message_id.as_deref(), Some("m1"));
    }

    #[test]
    fn test_webhook_config() {
        let config = HookConfig;
        assert_eq!(config.platform_name(), "mock");
        assert_eq!(config.secret(), Some("mock-secret"));
        assert!(config.webhook_url().unwrap().starts_with("https://"));
    }

    #[tokio::test]
    async fn test_context_explicit_token() {
        struct NoEndpoint;
        impl TokenEndpoint for NoEndpoint {
            fn name(&self) -> &'static str {
                "none"
            }
            fn token_url(&self, _id: &str, _secret: &str) -> Result<String> {
                Err(PushError::ConfigError("unused".to_string()))
            }
        }

        let transport = MockTransport::new();
        let ctx = PushContext::new(transport.clone());
        let token = ctx
            .access_token(&NoEndpoint, &TokenSource::AccessToken("T".into()))
            .await
            .unwrap();
        assert_eq!(token, "T");
        assert_eq!(transport.request_count(), 0);
    }
}
