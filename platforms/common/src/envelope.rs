use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{PushError, Result};

/// 平台响应信封
pub trait ResponseEnvelope: Sized {
    fn code(&self) -> i64;

    fn message(&self) -> &str;

    fn succeed(&self) -> bool {
        self.code() == 0
    }

    /// 失败信封转换为 `RemoteApiError`
    fn into_result(self) -> Result<Self> {
        if self.succeed() {
            Ok(self)
        } else {
            Err(PushError::RemoteApiError {
                code: self.code(),
                message: self.message().to_string(),
            })
        }
    }
}

/// 微信、企业微信接口统一的响应头
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WxResponse {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl ResponseEnvelope for WxResponse {
    fn code(&self) -> i64 {
        self.errcode
    }

    fn message(&self) -> &str {
        &self.errmsg
    }
}

impl fmt::Display for WxResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errcode: {}, errmsg: {:?}", self.errcode, self.errmsg)
    }
}

/// 解析平台响应体
pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| PushError::PlatformError(format!("invalid response body: {e}; body: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wx_response_success() {
        let resp: WxResponse = decode_json(r#"{"errcode":0,"errmsg":"ok"}"#).unwrap();
        assert!(resp.succeed());
        assert!(resp.into_result().is_ok());
    }

    #[test]
    fn test_wx_response_missing_fields_means_success() {
        let resp: WxResponse = decode_json("{}").unwrap();
        assert_eq!(resp, WxResponse::default());
        assert!(resp.succeed());
    }

    #[test]
    fn test_wx_response_failure() {
        let resp: WxResponse = decode_json(r#"{"errcode":40001,"errmsg":"invalid credential"}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.remote_code(), Some(40001));
        assert!(err.to_string().contains("invalid credential"));
    }

    #[test]
    fn test_decode_invalid_body() {
        let err = decode_json::<WxResponse>("<html>").unwrap_err();
        assert!(matches!(err, PushError::PlatformError(_)));
    }
}
