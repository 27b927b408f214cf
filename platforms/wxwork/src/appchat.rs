//! 企业微信应用推送消息到群聊会话

use common::envelope::ResponseEnvelope;
use common::message::msg_type;
use common::transport::post_json_as;
use common::validate::{ensure_msg_type, ensure_not_empty, ensure_one_of};
use common::{PushContext, PushResult, Result, WxResponse};
use log::info;
use serde::{Deserialize, Serialize};

use crate::message::WorkBody;
use crate::token::WorkTokenEndpoint;
use crate::{Auth, api_url};

const APPCHAT_SEND_PATH: &str = "appchat/send";

/// 群聊消息支持的消息类型
pub const APPCHAT_MSG_TYPES: [&str; 9] = [
    msg_type::TEXT,
    msg_type::IMAGE,
    msg_type::VOICE,
    msg_type::VIDEO,
    msg_type::FILE,
    msg_type::TEXT_CARD,
    msg_type::NEWS,
    msg_type::MPNEWS,
    msg_type::MARKDOWN,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppChatMessage {
    pub chatid: String,
    pub msgtype: String,
    /// 0 可对外分享，1 不能分享且内容显示水印
    #[serde(default)]
    pub safe: i64,
    #[serde(flatten)]
    pub body: WorkBody,
}

#[derive(Debug, Clone, Default)]
pub struct AppChatParams {
    pub auth: Auth,
    pub chat_id: String,
    pub msg_type: String,
    pub safe: i64,
    pub data: String,
}

impl AppChatParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_not_empty("chat_id", &self.chat_id)?;
        ensure_msg_type(&self.msg_type, &APPCHAT_MSG_TYPES)?;
        ensure_one_of("safe", self.safe, &[0, 1])
    }
}

/// 发送群聊会话消息
pub async fn send(ctx: &PushContext, params: AppChatParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let body = WorkBody::build(&params.msg_type, &params.data)?;
    let message = AppChatMessage {
        chatid: params.chat_id,
        msgtype: body.msg_type().to_string(),
        safe: params.safe,
        body,
    };

    let access_token = ctx.access_token(&WorkTokenEndpoint, &source).await?;
    let url = api_url(APPCHAT_SEND_PATH, &access_token)?;
    let resp: WxResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("workweixin appchat message sent to {}", message.chatid);
    Ok(PushResult::with_response(resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::MockTransport;
    use serde_json::json;

    fn params(msg_type: &str, data: &str) -> AppChatParams {
        AppChatParams {
            auth: Auth::with_token("T"),
            chat_id: "CHATID".into(),
            msg_type: msg_type.into(),
            data: data.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate() {
        assert!(params("markdown", "**hi**").validate().is_ok());
        assert!(params("template_card", "{}").validate().unwrap_err().is_validation());
        assert!(params("miniprogram_notice", "{}").validate().unwrap_err().is_validation());

        let mut p = params("text", "hi");
        p.safe = 2;
        assert!(p.validate().unwrap_err().is_validation());

        let mut p = params("text", "hi");
        p.chat_id = String::new();
        assert!(p.validate().unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_send() {
        let transport = MockTransport::new().respond(r#"{"errcode":0,"errmsg":"ok"}"#);
        let ctx = PushContext::new(transport.clone());
        let mut p = params("text", "hello");
        p.safe = 1;
        send(&ctx, p).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            "https://qyapi.weixin.qq.com/cgi-bin/appchat/send?access_token=T"
        );
        assert_eq!(
            request.body,
            Some(json!({
                "chatid": "CHATID",
                "msgtype": "text",
                "safe": 1,
                "text": {"content": "hello"}
            }))
        );
    }
}
