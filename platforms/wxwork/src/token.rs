use common::transport::with_query;
use common::validate::ensure_not_empty;
use common::{Credential, PushContext, Result, TokenEndpoint};
use log::warn;

use crate::{CREDENTIAL_FLAGS, PLATFORM_NAME};

const ACCESS_TOKEN_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/gettoken";

/// 企业微信凭证接口
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkTokenEndpoint;

impl TokenEndpoint for WorkTokenEndpoint {
    fn name(&self) -> &'static str {
        PLATFORM_NAME
    }

    fn token_url(&self, corp_id: &str, corp_secret: &str) -> Result<String> {
        if corp_id.starts_with("wx") {
            warn!("corp_id starts with 'wx', which looks like a weixin app id");
        }
        with_query(
            ACCESS_TOKEN_URL,
            &[("corpid", corp_id), ("corpsecret", corp_secret)],
        )
    }
}

/// 获取凭证的参数
#[derive(Debug, Clone, Default)]
pub struct TokenParams {
    pub corp_id: String,
    pub corp_secret: String,
}

impl TokenParams {
    pub fn validate(&self) -> Result<()> {
        ensure_not_empty(CREDENTIAL_FLAGS.id, &self.corp_id)?;
        ensure_not_empty(CREDENTIAL_FLAGS.secret, &self.corp_secret)
    }
}

/// 获取企业微信接口调用凭证
pub async fn fetch_access_token(ctx: &PushContext, params: TokenParams) -> Result<Credential> {
    params.validate()?;
    ctx.credentials()
        .get_or_acquire(
            ctx.transport(),
            &WorkTokenEndpoint,
            &params.corp_id,
            &params.corp_secret,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::MockTransport;

    #[test]
    fn test_token_url() {
        assert_eq!(
            WorkTokenEndpoint.token_url("ww1", "s1").unwrap(),
            "https://qyapi.weixin.qq.com/cgi-bin/gettoken?corpid=ww1&corpsecret=s1"
        );
    }

    #[tokio::test]
    async fn test_fetch_access_token() {
        let transport = MockTransport::new()
            .respond(r#"{"errcode":0,"errmsg":"ok","access_token":"T","expires_in":7200}"#);
        let ctx = PushContext::new(transport.clone());
        let params = TokenParams {
            corp_id: "ww1".into(),
            corp_secret: "s1".into(),
        };
        let credential = fetch_access_token(&ctx, params.clone()).await.unwrap();
        assert_eq!(credential.access_token, "T");

        // 同一进程内复用
        let again = fetch_access_token(&ctx, params).await.unwrap();
        assert_eq!(again, credential);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_access_token_invalid_credential() {
        let transport = MockTransport::new()
            .respond(r#"{"errcode":40001,"errmsg":"invalid credential"}"#);
        let ctx = PushContext::new(transport);
        let err = fetch_access_token(
            &ctx,
            TokenParams {
                corp_id: "ww1".into(),
                corp_secret: "bad".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.remote_code(), Some(40001));
    }
}
