//! 微信公众号、小程序消息推送

use common::transport::with_query;
use common::{CredentialFlags, Result, TokenSource};

pub mod customer;
pub mod media;
pub mod subscribe;
pub mod template;
pub mod token;

pub const PLATFORM_NAME: &str = "weixin";

const API_BASE: &str = "https://api.weixin.qq.com/cgi-bin";

pub const CREDENTIAL_FLAGS: CredentialFlags = CredentialFlags {
    access_token: "access_token",
    id: "app_id",
    secret: "app_secret",
};

/// 微信接口调用凭证参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    pub access_token: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

impl Auth {
    pub fn with_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Default::default()
        }
    }

    pub fn with_secret(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            access_token: None,
            app_id: Some(app_id.into()),
            app_secret: Some(app_secret.into()),
        }
    }

    pub fn token_source(&self) -> Result<TokenSource> {
        TokenSource::from_flags(
            self.access_token.clone(),
            self.app_id.clone(),
            self.app_secret.clone(),
            CREDENTIAL_FLAGS,
        )
    }
}

/// 带 access_token 的接口地址
fn api_url(path: &str, access_token: &str) -> Result<String> {
    with_query(&format!("{API_BASE}/{path}"), &[("access_token", access_token)])
}
