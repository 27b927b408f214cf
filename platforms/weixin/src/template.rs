//! 公众号模板消息与一次性订阅模板消息

use std::collections::BTreeMap;
use std::fmt;

use common::envelope::ResponseEnvelope;
use common::transport::post_json_as;
use common::validate::{ensure_max_chars, ensure_not_empty, parse_json};
use common::{PushContext, PushError, PushResult, Result, WxResponse};
use log::info;
use serde::{Deserialize, Serialize};

use crate::token::WeixinTokenEndpoint;
use crate::{Auth, api_url};

const TEMPLATE_SEND_PATH: &str = "message/template/send";
const TEMPLATE_SUBSCRIBE_PATH: &str = "message/template/subscribe";

/// 订阅消息标题最大长度
pub const TITLE_MAX_CHARS: usize = 15;
/// 订阅消息模板值最大长度
pub const SUBSCRIBE_VALUE_MAX_CHARS: usize = 200;

/// 跳转小程序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramMeta {
    pub appid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pagepath: String,
}

impl MiniProgramMeta {
    /// 解析 `app_id=XiaoChengXuAppId,page_path=index?foo=bar`
    pub fn parse_flag(raw: &str) -> Result<Self> {
        let mut meta = Self::default();
        for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| PushError::validation(format!("invalid mini: {pair:?}")))?;
            match key.trim() {
                "app_id" => meta.appid = value.trim().to_string(),
                "page_path" => meta.pagepath = value.trim().to_string(),
                other => {
                    return Err(PushError::validation(format!(
                        "invalid mini: unknown key {other:?}"
                    )));
                }
            }
        }
        ensure_not_empty("mini.app_id", &meta.appid)?;
        Ok(meta)
    }
}

/// 模板数据项
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDataItem {
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,
}

pub type TemplateData = BTreeMap<String, TemplateDataItem>;

/// 模板消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMessage {
    pub touser: String,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miniprogram: Option<MiniProgramMeta>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_msg_id: String,
    pub data: TemplateData,
}

/// 模板消息发送结果
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateResponse {
    #[serde(flatten)]
    pub meta: WxResponse,
    #[serde(default)]
    pub msgid: i64,
}

impl ResponseEnvelope for TemplateResponse {
    fn code(&self) -> i64 {
        self.meta.errcode
    }

    fn message(&self) -> &str {
        &self.meta.errmsg
    }
}

impl fmt::Display for TemplateResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, msgid: {}", self.meta, self.msgid)
    }
}

/// 模板消息参数
#[derive(Debug, Clone, Default)]
pub struct TemplateParams {
    pub auth: Auth,
    pub to_user: String,
    pub template_id: String,
    pub url: Option<String>,
    pub mini: Option<MiniProgramMeta>,
    pub client_msg_id: Option<String>,
    /// 未指定颜色的数据项使用此颜色
    pub color: Option<String>,
    pub data: String,
}

impl TemplateParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_not_empty("to_user", &self.to_user)?;
        ensure_not_empty("template_id", &self.template_id)?;
        if let Some(mini) = &self.mini {
            ensure_not_empty("mini.app_id", &mini.appid)?;
        }
        Ok(())
    }
}

fn parse_template_data(data: &str) -> Result<TemplateData> {
    let data: TemplateData = parse_json(data)?;
    if data.is_empty() {
        return Err(PushError::validation("template data is empty"));
    }
    Ok(data)
}

/// 发送模板消息
pub async fn send(ctx: &PushContext, params: TemplateParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let mut data = parse_template_data(&params.data)?;
    if let Some(color) = params.color.filter(|c| !c.is_empty()) {
        for item in data.values_mut().filter(|item| item.color.is_empty()) {
            item.color = color.clone();
        }
    }
    let message = TemplateMessage {
        touser: params.to_user,
        template_id: params.template_id,
        url: params.url.unwrap_or_default(),
        miniprogram: params.mini,
        client_msg_id: params.client_msg_id.unwrap_or_default(),
        data,
    };

    let access_token = ctx.access_token(&WeixinTokenEndpoint, &source).await?;
    let url = api_url(TEMPLATE_SEND_PATH, &access_token)?;
    let resp: TemplateResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("weixin template message {} sent", resp.msgid);
    let result = PushResult::with_response(&resp);
    if resp.msgid > 0 {
        Ok(result.message_id(resp.msgid.to_string()))
    } else {
        Ok(result)
    }
}

/// 一次性订阅模板消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeTemplateMessage {
    pub touser: String,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub miniprogram: Option<MiniProgramMeta>,
    pub scene: String,
    pub title: String,
    pub data: TemplateData,
}

/// 一次性订阅模板消息参数
#[derive(Debug, Clone, Default)]
pub struct SubscribeTemplateParams {
    pub auth: Auth,
    pub to_user: String,
    pub template_id: String,
    pub scene: String,
    pub title: String,
    pub url: Option<String>,
    pub mini: Option<MiniProgramMeta>,
    pub data: String,
}

impl SubscribeTemplateParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_not_empty("to_user", &self.to_user)?;
        ensure_not_empty("template_id", &self.template_id)?;
        ensure_not_empty("scene", &self.scene)?;
        ensure_not_empty("title", &self.title)?;
        ensure_max_chars("title", &self.title, TITLE_MAX_CHARS)?;
        if let Some(mini) = &self.mini {
            ensure_not_empty("mini.app_id", &mini.appid)?;
        }
        Ok(())
    }
}

/// 订阅消息数据的值非空且不超过 200 个字符
fn parse_subscribe_data(data: &str) -> Result<TemplateData> {
    let data = parse_template_data(data)?;
    for (key, item) in &data {
        let field = format!("{key}.value");
        ensure_not_empty(&field, &item.value)?;
        ensure_max_chars(&field, &item.value, SUBSCRIBE_VALUE_MAX_CHARS)?;
    }
    Ok(data)
}

/// 发送一次性订阅模板消息
pub async fn subscribe(ctx: &PushContext, params: SubscribeTemplateParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let message = SubscribeTemplateMessage {
        touser: params.to_user,
        template_id: params.template_id,
        url: params.url.unwrap_or_default(),
        miniprogram: params.mini,
        scene: params.scene,
        title: params.title,
        data: parse_subscribe_data(&params.data)?,
    };

    let access_token = ctx.access_token(&WeixinTokenEndpoint, &source).await?;
    let url = api_url(TEMPLATE_SUBSCRIBE_PATH, &access_token)?;
    let resp: WxResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("weixin subscribe template message sent to {}", message.touser);
    Ok(PushResult::with_response(resp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::MockTransport;
    use serde_json::json;

    fn subscribe_params(title: &str) -> SubscribeTemplateParams {
        SubscribeTemplateParams {
            auth: Auth::with_secret("wx1", "s1"),
            to_user: "openid".into(),
            template_id: "tpl".into(),
            scene: "1000".into(),
            title: title.into(),
            data: r##"{"content":{"value":"test","color":"#173177"}}"##.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_mini_flag() {
        let mini = MiniProgramMeta::parse_flag("app_id=wxapp,page_path=index?foo=bar").unwrap();
        assert_eq!(mini.appid, "wxapp");
        assert_eq!(mini.pagepath, "index?foo=bar");
        assert!(MiniProgramMeta::parse_flag("page_path=index").unwrap_err().is_validation());
        assert!(MiniProgramMeta::parse_flag("app_id").is_err());
        assert!(MiniProgramMeta::parse_flag("app_id=a,foo=b").is_err());
    }

    #[test]
    fn test_subscribe_title_limit() {
        assert!(subscribe_params("一二三四五六七八九十一二三四五").validate().is_ok());
        let err = subscribe_params("0123456789abcdef").validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn test_subscribe_data_limits() {
        assert!(parse_subscribe_data(r#"{"content":{"value":""}}"#).unwrap_err().is_validation());
        let long = "x".repeat(201);
        let data = format!(r#"{{"content":{{"value":"{long}"}}}}"#);
        assert!(parse_subscribe_data(&data).unwrap_err().is_validation());
        let ok = "x".repeat(200);
        let data = format!(r#"{{"content":{{"value":"{ok}"}}}}"#);
        assert!(parse_subscribe_data(&data).is_ok());
        assert!(matches!(
            parse_subscribe_data("[]").unwrap_err(),
            PushError::PayloadError(_)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_long_title_never_reaches_network() {
        let transport = MockTransport::new();
        let ctx = PushContext::new(transport.clone());
        let err = subscribe(&ctx, subscribe_params("abcdefghijklmnopqrst"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_send() {
        let transport = MockTransport::new()
            .respond(r#"{"access_token":"T","expires_in":7200}"#)
            .respond(r#"{"errcode":0,"errmsg":"ok"}"#);
        let ctx = PushContext::new(transport.clone());
        let mut params = subscribe_params("标题");
        params.mini = Some(MiniProgramMeta {
            appid: "wxapp".into(),
            pagepath: String::new(),
        });

        subscribe(&ctx, params).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].url,
            "https://api.weixin.qq.com/cgi-bin/message/template/subscribe?access_token=T"
        );
        assert_eq!(
            requests[1].body,
            Some(json!({
                "touser": "openid",
                "template_id": "tpl",
                "miniprogram": {"appid": "wxapp"},
                "scene": "1000",
                "title": "标题",
                "data": {"content": {"value": "test", "color": "#173177"}}
            }))
        );
    }

    #[tokio::test]
    async fn test_template_send_applies_default_color() {
        let transport = MockTransport::new().respond(r#"{"errcode":0,"errmsg":"ok","msgid":200228332}"#);
        let ctx = PushContext::new(transport.clone());
        let params = TemplateParams {
            auth: Auth::with_token("T"),
            to_user: "openid".into(),
            template_id: "tpl".into(),
            url: Some("https://example.com".into()),
            color: Some("#FF0000".into()),
            data: r##"{"first":{"value":"a"},"remark":{"value":"b","color":"#000000"}}"##.into(),
            ..Default::default()
        };

        let result = send(&ctx, params).await.unwrap();
        assert_eq!(result.message_id.as_deref(), Some("200228332"));

        let body = transport.last_body().unwrap();
        assert_eq!(body["url"], "https://example.com");
        assert_eq!(body["data"]["first"]["color"], "#FF0000");
        assert_eq!(body["data"]["remark"]["color"], "#000000");
        assert!(body.get("client_msg_id").is_none());
    }

    #[tokio::test]
    async fn test_template_send_without_msgid() {
        let transport = MockTransport::new().respond(r#"{"errcode":0,"errmsg":"ok"}"#);
        let ctx = PushContext::new(transport);
        let params = TemplateParams {
            auth: Auth::with_token("T"),
            to_user: "openid".into(),
            template_id: "tpl".into(),
            data: r#"{"first":{"value":"a"}}"#.into(),
            ..Default::default()
        };

        let result = send(&ctx, params).await.unwrap();
        assert!(result.message_id.is_none());
    }

    #[test]
    fn test_template_message_round_trip() {
        let message = TemplateMessage {
            touser: "openid".into(),
            template_id: "tpl".into(),
            url: String::new(),
            miniprogram: Some(MiniProgramMeta {
                appid: "wxapp".into(),
                pagepath: "index".into(),
            }),
            client_msg_id: "c1".into(),
            data: parse_template_data(r#"{"k":{"value":"v"}}"#).unwrap(),
        };
        let value = serde_json::to_value(&message).unwrap();
        let decoded: TemplateMessage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, message);
    }
}
