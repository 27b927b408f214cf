/// 推送平台错误类型
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// 参数校验失败，请求尚未发出
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 消息体不是合法的 JSON，或与消息类型不匹配
    #[error("Payload error: {0}")]
    PayloadError(String),

    /// 凭证不可用
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// 平台返回了失败的响应信封
    #[error("Remote API error: code={code}, message={message}")]
    RemoteApiError { code: i64, message: String },

    /// HTTP 状态码不是 2xx
    #[error("HTTP request failed: status {status}, {method} {url}")]
    TransportError {
        method: String,
        url: String,
        status: u16,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    /// 平台响应无法解析
    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PushError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::PayloadError(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }

    /// 平台错误码（仅 `RemoteApiError`）
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::RemoteApiError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T, E = PushError> = std::result::Result<T, E>;
