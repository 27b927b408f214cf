//! 飞书自定义机器人

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use common::envelope::{ResponseEnvelope, decode_json};
use common::validate::{ensure_msg_type, ensure_not_empty, parse_json};
use common::{PushContext, PushError, PushResult, Result, WebhookConfig};
use hmac::{Hmac, Mac};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

const PLATFORM_NAME: &str = "feishu";
const BASE_URL: &str = "https://open.feishu.cn/open-apis/bot/v2/hook";

pub const FEISHU_MSG_TYPES: [&str; 5] = ["text", "post", "image", "share_chat", "interactive"];

type HmacSha256 = Hmac<Sha256>;

/// 飞书机器人配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeishuConfig {
    pub token: String,
    pub secret: Option<String>,
}

impl WebhookConfig for FeishuConfig {
    fn platform_name(&self) -> &str {
        PLATFORM_NAME
    }

    fn webhook_url(&self) -> Result<String> {
        Ok(format!("{BASE_URL}/{}", self.token))
    }

    fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|v| !v.is_empty())
    }
}

/// 签名校验：以 `timestamp + "\n" + secret` 为密钥对空串做 HmacSHA256，再 base64
pub fn sign(timestamp: i64, secret: &str) -> Result<String> {
    let key = format!("{timestamp}\n{secret}");
    let mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| PushError::ConfigError(format!("invalid sign key: {e}")))?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// 消息内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeishuContent {
    Text { text: String },
    Post { post: Value },
    Image { image_key: String },
    ShareChat { share_chat_id: String },
}

/// 普通消息放在 content 中，卡片消息放在 card 中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeishuBody {
    Content(FeishuContent),
    Card(Value),
}

impl FeishuBody {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Content(FeishuContent::Text { .. }) => "text",
            Self::Content(FeishuContent::Post { .. }) => "post",
            Self::Content(FeishuContent::Image { .. }) => "image",
            Self::Content(FeishuContent::ShareChat { .. }) => "share_chat",
            Self::Card(_) => "interactive",
        }
    }

    pub fn build(kind: &str, data: &str) -> Result<Self> {
        let body = match kind {
            "text" => Self::Content(FeishuContent::Text {
                text: data.to_string(),
            }),
            "image" => Self::Content(FeishuContent::Image {
                image_key: data.to_string(),
            }),
            "share_chat" => Self::Content(FeishuContent::ShareChat {
                share_chat_id: data.to_string(),
            }),
            "post" => Self::Content(FeishuContent::Post {
                post: json_object("post", data)?,
            }),
            "interactive" => Self::Card(json_object("card", data)?),
            other => {
                return Err(PushError::validation(format!(
                    "unsupported feishu message type {other:?}"
                )));
            }
        };
        Ok(body)
    }
}

fn json_object(field: &str, data: &str) -> Result<Value> {
    let value: Value = parse_json(data)?;
    if !value.is_object() {
        return Err(PushError::validation(format!("{field} must be a json object")));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeishuMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
    pub msg_type: String,
    #[serde(flatten)]
    pub body: FeishuBody,
}

impl FeishuMessage {
    pub fn new(body: FeishuBody) -> Self {
        Self {
            timestamp: None,
            sign: None,
            msg_type: body.msg_type().to_string(),
            body,
        }
    }

    /// 附加签名，timestamp 为秒级时间戳
    pub fn signed(mut self, timestamp: i64, secret: &str) -> Result<Self> {
        self.sign = Some(sign(timestamp, secret)?);
        self.timestamp = Some(timestamp.to_string());
        Ok(self)
    }
}

/// 飞书响应，新版为 code/msg，旧版为 StatusCode/StatusMessage
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeishuResponse {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default, rename = "StatusCode")]
    pub status_code: Option<i64>,
    #[serde(default, rename = "StatusMessage")]
    pub status_message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ResponseEnvelope for FeishuResponse {
    fn code(&self) -> i64 {
        self.code.or(self.status_code).unwrap_or_default()
    }

    fn message(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.status_message.as_deref())
            .unwrap_or_default()
    }
}

impl fmt::Display for FeishuResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code: {}, msg: {:?}", self.code(), self.message())
    }
}

/// 飞书发送参数
#[derive(Debug, Clone, Default)]
pub struct SendParams {
    pub token: String,
    pub secret: Option<String>,
    pub msg_type: String,
    pub data: String,
}

impl SendParams {
    pub fn validate(&self) -> Result<()> {
        ensure_not_empty("access_token", &self.token)?;
        ensure_msg_type(&self.msg_type, &FEISHU_MSG_TYPES)
    }
}

/// 发送飞书机器人消息
pub async fn send(ctx: &PushContext, params: SendParams) -> Result<PushResult> {
    params.validate()?;
    let config = FeishuConfig {
        token: params.token,
        secret: params.secret,
    };

    let body = FeishuBody::build(&params.msg_type, &params.data)?;
    let mut message = FeishuMessage::new(body);
    if let Some(secret) = config.secret() {
        message = message.signed(Utc::now().timestamp(), secret)?;
    }

    let payload = serde_json::to_value(&message)
        .map_err(|e| PushError::payload(format!("failed to encode message: {e}")))?;
    let body = ctx
        .transport()
        .post_json(&config.webhook_url()?, &payload)
        .await?;
    let resp: FeishuResponse = decode_json(&body)?;
    let resp = resp.into_result()?;

    info!("{} message sent: {}", config.platform_name(), message.msg_type);
    Ok(PushResult::with_response(resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::MockTransport;
    use serde_json::json;

    fn params(msg_type: &str, data: &str) -> SendParams {
        SendParams {
            token: "TOKEN".into(),
            msg_type: msg_type.into(),
            data: data.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sign() {
        assert_eq!(
            sign(1599360473, "demo").unwrap(),
            "l1N0gAcBjdwBvGm1xMjOF0XSyaLRpR7tuO5dHfhAYc8="
        );
    }

    #[test]
    fn test_message_json() {
        let message = FeishuMessage::new(FeishuBody::build("text", "新更新提醒").unwrap());
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"msg_type": "text", "content": {"text": "新更新提醒"}})
        );

        let card = FeishuMessage::new(
            FeishuBody::build("interactive", r#"{"elements":[]}"#).unwrap(),
        );
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value, json!({"msg_type": "interactive", "card": {"elements": []}}));
        let decoded: FeishuMessage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, card);
    }

    #[test]
    fn test_share_chat_round_trip() {
        let message = FeishuMessage::new(FeishuBody::build("share_chat", "oc_1").unwrap())
            .signed(1599360473, "demo")
            .unwrap();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["timestamp"], "1599360473");
        assert_eq!(value["content"], json!({"share_chat_id": "oc_1"}));
        let decoded: FeishuMessage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_post_must_be_object() {
        assert!(FeishuBody::build("post", "[]").unwrap_err().is_validation());
        assert!(matches!(
            FeishuBody::build("post", "zh_cn").unwrap_err(),
            PushError::PayloadError(_)
        ));
        assert!(params("file", "x").validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_response_envelopes() {
        let resp: FeishuResponse = decode_json(r#"{"code":0,"msg":"success","data":{}}"#).unwrap();
        assert!(resp.succeed());

        let resp: FeishuResponse =
            decode_json(r#"{"StatusCode":0,"StatusMessage":"success"}"#).unwrap();
        assert_eq!(resp.to_string(), r#"code: 0, msg: "success""#);

        let resp: FeishuResponse =
            decode_json(r#"{"code":19021,"msg":"sign match fail or timestamp is not within one hour from current time"}"#)
                .unwrap();
        assert_eq!(resp.into_result().unwrap_err().remote_code(), Some(19021));
    }

    #[tokio::test]
    async fn test_send_signed() {
        let transport = MockTransport::new().respond(r#"{"code":0,"msg":"success","data":{}}"#);
        let ctx = PushContext::new(transport.clone());
        let mut p = params("text", "hello");
        p.secret = Some("demo".into());
        let result = send(&ctx, p).await.unwrap();
        assert_eq!(result.to_string(), r#"ok; code: 0, msg: "success""#);

        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            "https://open.feishu.cn/open-apis/bot/v2/hook/TOKEN"
        );
        let body = request.body.clone().unwrap();
        let timestamp: i64 = body["timestamp"].as_str().unwrap().parse().unwrap();
        assert_eq!(body["sign"], sign(timestamp, "demo").unwrap());
        assert_eq!(body["content"], json!({"text": "hello"}));
    }

    #[tokio::test]
    async fn test_send_unsigned() {
        let transport = MockTransport::new().respond(r#"{"StatusCode":0,"StatusMessage":"success"}"#);
        let ctx = PushContext::new(transport.clone());
        send(&ctx, params("image", "img_v2_key")).await.unwrap();

        let body = transport.last_body().unwrap();
        assert_eq!(body, json!({"msg_type": "image", "content": {"image_key": "img_v2_key"}}));
    }
}
