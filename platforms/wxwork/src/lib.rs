//! 企业微信消息推送

use common::transport::with_query;
use common::validate::{ensure_interval, ensure_one_of};
use common::{CredentialFlags, Result, TokenSource};
use serde::{Deserialize, Serialize};

pub mod app;
pub mod appchat;
pub mod external_contact;
pub mod kf;
pub mod message;
pub mod token;

pub const PLATFORM_NAME: &str = "workweixin";

const API_BASE: &str = "https://qyapi.weixin.qq.com/cgi-bin";

pub const CREDENTIAL_FLAGS: CredentialFlags = CredentialFlags {
    access_token: "access_token",
    id: "corp_id",
    secret: "corp_secret",
};

/// 重复消息检查的最大时间间隔（秒）
pub const MAX_DUPLICATE_CHECK_INTERVAL: i64 = 4 * 3600;
/// 重复消息检查的默认时间间隔（秒）
pub const DEFAULT_DUPLICATE_CHECK_INTERVAL: i64 = 1800;

/// 企业微信接口调用凭证参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub access_token: Option<String>,
    pub corp_id: Option<String>,
    pub corp_secret: Option<String>,
}

impl Auth {
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Default::default()
        }
    }

    pub fn with_secret(corp_id: impl Into<String>, corp_secret: impl Into<String>) -> Self {
        Self {
            access_token: None,
            corp_id: Some(corp_id.into()),
            corp_secret: Some(corp_secret.into()),
        }
    }

    pub fn token_source(&self) -> Result<TokenSource> {
        TokenSource::from_flags(
            self.access_token.clone(),
            self.corp_id.clone(),
            self.corp_secret.clone(),
            CREDENTIAL_FLAGS,
        )
    }
}

/// id 转译与重复消息检查
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    /// 是否开启id转译，0表示否，1表示是
    #[serde(default)]
    pub enable_id_trans: i64,
    /// 是否开启重复消息检查，0表示否，1表示是
    #[serde(default)]
    pub enable_duplicate_check: i64,
    /// 重复消息检查的时间间隔，默认1800s，最大不超过4小时
    #[serde(default = "default_duplicate_check_interval")]
    pub duplicate_check_interval: i64,
}

fn default_duplicate_check_interval() -> i64 {
    DEFAULT_DUPLICATE_CHECK_INTERVAL
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            enable_id_trans: 0,
            enable_duplicate_check: 0,
            duplicate_check_interval: DEFAULT_DUPLICATE_CHECK_INTERVAL,
        }
    }
}

impl DeliveryOptions {
    pub fn validate(&self) -> Result<()> {
        ensure_one_of("enable_id_trans", self.enable_id_trans, &[0, 1])?;
        ensure_one_of("enable_duplicate_check", self.enable_duplicate_check, &[0, 1])?;
        ensure_interval(
            "duplicate_check_interval",
            self.duplicate_check_interval,
            MAX_DUPLICATE_CHECK_INTERVAL,
        )
    }
}

/// 带 access_token 的接口地址
fn api_url(path: &str, access_token: &str) -> Result<String> {
    with_query(&format!("{API_BASE}/{path}"), &[("access_token", access_token)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_options() {
        assert!(DeliveryOptions::default().validate().is_ok());

        let options = DeliveryOptions {
            duplicate_check_interval: 14401,
            ..Default::default()
        };
        assert!(options.validate().unwrap_err().is_validation());

        let options = DeliveryOptions {
            duplicate_check_interval: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = DeliveryOptions {
            enable_id_trans: 2,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = DeliveryOptions {
            enable_duplicate_check: 1,
            duplicate_check_interval: 14400,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_api_url() {
        assert_eq!(
            api_url("message/send", "T").unwrap(),
            "https://qyapi.weixin.qq.com/cgi-bin/message/send?access_token=T"
        );
    }

    #[test]
    fn test_auth() {
        assert!(Auth::default().token_source().unwrap_err().to_string().contains("corp_id"));
        assert!(Auth::with_secret("ww1", "s").token_source().is_ok());
    }
}
