use common::transport::with_query;
use common::validate::ensure_not_empty;
use common::{Credential, PushContext, Result, TokenEndpoint};
use log::warn;

use crate::{CREDENTIAL_FLAGS, PLATFORM_NAME};

const ACCESS_TOKEN_URL: &str = "https://api.weixin.qq.com/cgi-bin/token";

/// 公众号/小程序凭证接口
#[derive(Debug, Clone, Copy, Default)]
pub struct WeixinTokenEndpoint;

impl TokenEndpoint for WeixinTokenEndpoint {
    fn name(&self) -> &'static str {
        PLATFORM_NAME
    }

    fn token_url(&self, app_id: &str, app_secret: &str) -> Result<String> {
        if app_id.starts_with("ww") {
            warn!("app_id starts with 'ww', which looks like a work weixin corp id");
        }
        with_query(
            ACCESS_TOKEN_URL,
            &[
                ("grant_type", "client_credential"),
                ("appid", app_id),
                ("secret", app_secret),
            ],
        )
    }
}

/// 获取凭证的参数
#[derive(Debug, Clone, Default)]
pub struct TokenParams {
    pub app_id: String,
    pub app_secret: String,
}

impl TokenParams {
    pub fn validate(&self) -> Result<()> {
        ensure_not_empty(CREDENTIAL_FLAGS.id, &self.app_id)?;
        ensure_not_empty(CREDENTIAL_FLAGS.secret, &self.app_secret)
    }
}

/// 获取微信接口调用凭证
pub async fn fetch_access_token(ctx: &PushContext, params: TokenParams) -> Result<Credential> {
    params.validate()?;
    ctx.credentials()
        .get_or_acquire(
            ctx.transport(),
            &WeixinTokenEndpoint,
            &params.app_id,
            &params.app_secret,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::MockTransport;

    #[test]
    fn test_token_url() {
        let url = WeixinTokenEndpoint.token_url("wx1", "s1").unwrap();
        assert_eq!(
            url,
            "https://api.weixin.qq.com/cgi-bin/token?grant_type=client_credential&appid=wx1&secret=s1"
        );
    }

    #[tokio::test]
    async fn test_fetch_access_token() {
        let transport =
            MockTransport::new().respond(r#"{"access_token":"T","expires_in":7200}"#);
        let ctx = PushContext::new(transport.clone());
        let credential = fetch_access_token(
            &ctx,
            TokenParams {
                app_id: "wx1".into(),
                app_secret: "s1".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(credential.access_token, "T");
        assert_eq!(credential.expires_in, 7200);
        assert!(transport.requests()[0].url.contains("appid=wx1"));
    }

    #[tokio::test]
    async fn test_fetch_access_token_rejected() {
        let transport = MockTransport::new()
            .respond(r#"{"errcode":40013,"errmsg":"invalid appid"}"#);
        let ctx = PushContext::new(transport);
        let err = fetch_access_token(
            &ctx,
            TokenParams {
                app_id: "bad".into(),
                app_secret: "s".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.remote_code(), Some(40013));
    }

    #[tokio::test]
    async fn test_fetch_access_token_requires_secret() {
        let transport = MockTransport::new();
        let ctx = PushContext::new(transport.clone());
        let err = fetch_access_token(
            &ctx,
            TokenParams {
                app_id: "wx1".into(),
                app_secret: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.request_count(), 0);
    }
}
