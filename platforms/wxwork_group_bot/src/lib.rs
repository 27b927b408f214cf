use std::fmt;
use std::path::PathBuf;

use common::envelope::ResponseEnvelope;
use common::message::{MarkdownMeta, MediaMeta, msg_type};
use common::transport::{post_file_as, post_json_as, with_query};
use common::validate::{
    ensure_file_exists, ensure_items_range, ensure_msg_type, ensure_not_empty, ensure_one_of,
    parse_json,
};
use common::{PushContext, PushError, PushResult, Result, WebhookConfig, WxResponse};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PLATFORM_NAME: &str = "wxwork_group_bot";
const BASE_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/webhook/send";
const UPLOAD_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/webhook/upload_media";

/// 群机器人支持的消息类型
pub const BOT_MSG_TYPES: [&str; 7] = [
    msg_type::TEXT,
    msg_type::MARKDOWN,
    msg_type::IMAGE,
    msg_type::NEWS,
    msg_type::FILE,
    msg_type::VOICE,
    msg_type::TEMPLATE_CARD,
];

/// 上传文件类型：普通文件、语音
pub const UPLOAD_MEDIA_TYPES: [&str; 2] = [
    msg_type::FILE,
    msg_type::VOICE,
];

/// 图文消息最多 8 条
pub const MAX_ARTICLES: usize = 8;

/// 上传表单字段名
const MEDIA_FIELD: &str = "media";

/// 企业微信机器人配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WxWorkConfig {
    pub key: String,
}

impl WebhookConfig for WxWorkConfig {
    fn platform_name(&self) -> &str {
        PLATFORM_NAME
    }

    fn webhook_url(&self) -> Result<String> {
        with_query(BASE_URL, &[("key", self.key.as_str())])
    }

    fn secret(&self) -> Option<&str> {
        None // 群机器人只靠 webhook key 鉴权
    }
}

impl WxWorkConfig {
    fn upload_url(&self, media_type: &str) -> Result<String> {
        with_query(UPLOAD_URL, &[("key", self.key.as_str()), ("type", media_type)])
    }
}

// --- 群机器人消息 ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotText {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_mobile_list: Vec<String>,
}

/// 图片内容的 base64 编码与编码前的 md5 值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotImage {
    pub base64: String,
    pub md5: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotNews {
    pub articles: Vec<BotArticle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotArticle {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub picurl: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotBody {
    Text(BotText),
    Markdown(MarkdownMeta),
    Image(BotImage),
    News(BotNews),
    File(MediaMeta),
    Voice(MediaMeta),
    #[serde(rename = "template_card")]
    TemplateCard(Value),
}

impl BotBody {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Text(_) => msg_type::TEXT,
            Self::Markdown(_) => msg_type::MARKDOWN,
            Self::Image(_) => msg_type::IMAGE,
            Self::News(_) => msg_type::NEWS,
            Self::File(_) => msg_type::FILE,
            Self::Voice(_) => msg_type::VOICE,
            Self::TemplateCard(_) => msg_type::TEMPLATE_CARD,
        }
    }

    /// 解析消息体，`@` 提醒只作用于文本消息
    pub fn build(kind: &str, data: &str, at_user: Vec<String>, at_mobile: Vec<String>) -> Result<Self> {
        if kind != msg_type::TEXT && !(at_user.is_empty() && at_mobile.is_empty()) {
            warn!("mentions are ignored by {kind} messages");
        }
        let body = match kind {
            msg_type::TEXT => Self::Text(BotText {
                content: data.to_string(),
                mentioned_list: at_user,
                mentioned_mobile_list: at_mobile,
            }),
            msg_type::MARKDOWN => Self::Markdown(MarkdownMeta {
                content: data.to_string(),
            }),
            msg_type::FILE => Self::File(MediaMeta::new(data)),
            msg_type::VOICE => Self::Voice(MediaMeta::new(data)),
            msg_type::IMAGE => {
                let image: BotImage = parse_json(data)?;
                ensure_not_empty("base64", &image.base64)?;
                ensure_not_empty("md5", &image.md5)?;
                Self::Image(image)
            }
            msg_type::NEWS => {
                let news: BotNews = parse_json(data)?;
                ensure_items_range("articles", &news.articles, 1, MAX_ARTICLES)?;
                for article in &news.articles {
                    ensure_not_empty("title", &article.title)?;
                    ensure_not_empty("url", &article.url)?;
                }
                Self::News(news)
            }
            msg_type::TEMPLATE_CARD => {
                let card: Value = parse_json(data)?;
                let card_type = card.get("card_type").and_then(Value::as_str).unwrap_or_default();
                if !card.is_object() || card_type.is_empty() {
                    return Err(PushError::validation("template_card.card_type is empty"));
                }
                Self::TemplateCard(card)
            }
            other => {
                return Err(PushError::validation(format!(
                    "unsupported group bot message type {other:?}"
                )));
            }
        };
        Ok(body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotMessage {
    pub msgtype: String,
    #[serde(flatten)]
    pub body: BotBody,
}

impl From<BotBody> for BotMessage {
    fn from(body: BotBody) -> Self {
        Self {
            msgtype: body.msg_type().to_string(),
            body,
        }
    }
}

/// 群机器人发送参数
#[derive(Debug, Clone, Default)]
pub struct SendParams {
    pub key: String,
    pub msg_type: String,
    pub at_user: Vec<String>,
    pub at_mobile: Vec<String>,
    pub data: String,
}

impl SendParams {
    pub fn validate(&self) -> Result<()> {
        ensure_not_empty("key", &self.key)?;
        ensure_msg_type(&self.msg_type, &BOT_MSG_TYPES)
    }
}

/// 群机器人发送消息
pub async fn send(ctx: &PushContext, params: SendParams) -> Result<PushResult> {
    params.validate()?;
    let config = WxWorkConfig { key: params.key };

    let body = BotBody::build(&params.msg_type, &params.data, params.at_user, params.at_mobile)?;
    let message = BotMessage::from(body);

    let url = config.webhook_url()?;
    let resp: WxResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("{} message sent: {}", config.platform_name(), message.msgtype);
    Ok(PushResult::with_response(resp))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub meta: WxResponse,
    #[serde(default, rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub media_id: String,
    #[serde(default)]
    pub created_at: String,
}

impl ResponseEnvelope for UploadResponse {
    fn code(&self) -> i64 {
        self.meta.errcode
    }

    fn message(&self) -> &str {
        &self.meta.errmsg
    }
}

impl fmt::Display for UploadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {:?}, media_id: {:?}, created_at: {:?}",
            self.media_type, self.media_id, self.created_at
        )
    }
}

/// 群机器人上传文件参数
#[derive(Debug, Clone)]
pub struct UploadParams {
    pub key: String,
    pub media_type: String,
    pub file: PathBuf,
}

impl Default for UploadParams {
    fn default() -> Self {
        Self {
            key: String::new(),
            media_type: msg_type::FILE.to_string(),
            file: PathBuf::new(),
        }
    }
}

impl UploadParams {
    pub fn validate(&self) -> Result<()> {
        ensure_not_empty("key", &self.key)?;
        ensure_one_of("media_type", self.media_type.as_str(), &UPLOAD_MEDIA_TYPES)?;
        ensure_file_exists(&self.file)
    }
}

/// 上传文件，返回的 media_id 三天内有效，仅限本机器人使用
pub async fn upload(ctx: &PushContext, params: UploadParams) -> Result<PushResult> {
    params.validate()?;
    let config = WxWorkConfig { key: params.key };

    let url = config.upload_url(&params.media_type)?;
    let resp: UploadResponse = post_file_as(ctx.transport(), &url, MEDIA_FIELD, &params.file).await?;
    let resp = resp.into_result()?;

    info!("{} media uploaded: {}", config.platform_name(), resp.media_id);
    Ok(PushResult::with_response(&resp).message_id(resp.media_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::MockTransport;
    use serde_json::json;
    use std::io::Write;

    fn params(msg_type: &str, data: &str) -> SendParams {
        SendParams {
            key: "KEY".into(),
            msg_type: msg_type.into(),
            data: data.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_webhook_config() {
        let config = WxWorkConfig { key: "KEY".into() };
        assert_eq!(
            config.webhook_url().unwrap(),
            "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=KEY"
        );
        let config = WxWorkConfig { key: "a&b c".into() };
        assert_eq!(
            config.webhook_url().unwrap(),
            "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=a%26b+c"
        );
        assert!(config.secret().is_none());
    }

    #[test]
    fn test_text_with_mentions() {
        let body = BotBody::build(
            "text",
            "Test",
            vec!["@all".into()],
            vec!["13800001111".into()],
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(BotMessage::from(body)).unwrap(),
            json!({
                "msgtype": "text",
                "text": {
                    "content": "Test",
                    "mentioned_list": ["@all"],
                    "mentioned_mobile_list": ["13800001111"]
                }
            })
        );
    }

    #[test]
    fn test_news_articles() {
        let article = json!({"title": "t", "url": "https://example.com"});
        let data = |n: usize| json!({ "articles": vec![article.clone(); n] }).to_string();
        assert!(BotBody::build("news", &data(8), vec![], vec![]).is_ok());
        assert!(BotBody::build("news", &data(9), vec![], vec![]).unwrap_err().is_validation());
        assert!(BotBody::build("news", &data(0), vec![], vec![]).unwrap_err().is_validation());
    }

    #[test]
    fn test_image_requires_md5() {
        let err = BotBody::build("image", r#"{"base64":"aGk="}"#, vec![], vec![]).unwrap_err();
        assert!(err.is_validation());
        let body = BotBody::build("image", r#"{"base64":"aGk=","md5":"49f68a5c"}"#, vec![], vec![]);
        assert!(matches!(body, Ok(BotBody::Image(_))));
    }

    #[test]
    fn test_message_round_trip() {
        let body = BotBody::build("template_card", r#"{"card_type":"text_notice"}"#, vec![], vec![])
            .unwrap();
        let message = BotMessage::from(body);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["template_card"]["card_type"], "text_notice");
        let decoded: BotMessage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn test_send() {
        let transport = MockTransport::new().respond(r#"{"errcode":0,"errmsg":"ok"}"#);
        let ctx = PushContext::new(transport.clone());
        let result = send(&ctx, params("markdown", "**hello**")).await.unwrap();
        assert_eq!(result.to_string(), r#"ok; errcode: 0, errmsg: "ok""#);

        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=KEY"
        );
        assert_eq!(
            request.body,
            Some(json!({"msgtype": "markdown", "markdown": {"content": "**hello**"}}))
        );
    }

    #[tokio::test]
    async fn test_send_invalid_key() {
        let transport =
            MockTransport::new().respond(r#"{"errcode":93000,"errmsg":"invalid webhook url"}"#);
        let ctx = PushContext::new(transport);
        let err = send(&ctx, params("text", "hi")).await.unwrap_err();
        assert_eq!(err.remote_code(), Some(93000));
    }

    #[tokio::test]
    async fn test_send_rejects_unknown_type() {
        let transport = MockTransport::new();
        let ctx = PushContext::new(transport.clone());
        assert!(send(&ctx, params("textcard", "{}")).await.unwrap_err().is_validation());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_upload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"report").unwrap();

        let transport = MockTransport::new().respond(
            r#"{"errcode":0,"errmsg":"ok","type":"file","media_id":"MEDIA","created_at":"1380000000"}"#,
        );
        let ctx = PushContext::new(transport.clone());
        let result = upload(
            &ctx,
            UploadParams {
                key: "KEY".into(),
                file: file.path().to_path_buf(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(result.message_id.as_deref(), Some("MEDIA"));
        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            "https://qyapi.weixin.qq.com/cgi-bin/webhook/upload_media?key=KEY&type=file"
        );
        assert_eq!(request.file.as_ref().map(|(field, _)| field.as_str()), Some("media"));
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let transport = MockTransport::new();
        let ctx = PushContext::new(transport.clone());
        let err = upload(
            &ctx,
            UploadParams {
                key: "KEY".into(),
                media_type: "image".into(),
                file: PathBuf::from("Cargo.toml"),
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.request_count(), 0);
    }
}
