//! Slack incoming webhook

use common::validate::{ensure_not_empty, parse_json};
use common::{PushContext, PushError, PushResult, Result, WebhookConfig};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PLATFORM_NAME: &str = "slack";

/// webhook 成功时的响应体
const RESPONSE_OK: &str = "ok";

/// Slack 机器人配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub url: String,
}

impl WebhookConfig for SlackConfig {
    fn platform_name(&self) -> &str {
        PLATFORM_NAME
    }

    fn webhook_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    fn secret(&self) -> Option<&str> {
        None
    }
}

/// Slack 发送参数，`data` 为原样发送的 JSON 消息体
#[derive(Debug, Clone, Default)]
pub struct SendParams {
    pub url: String,
    pub data: String,
}

impl SendParams {
    pub fn validate(&self) -> Result<()> {
        ensure_not_empty("url", &self.url)?;
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(PushError::validation("invalid url: webhook url must be http(s)"));
        }
        Ok(())
    }
}

/// 消息体必须是非空 JSON 对象
pub fn build_payload(data: &str) -> Result<Value> {
    let payload: Value = parse_json(data)?;
    match payload.as_object() {
        Some(map) if !map.is_empty() => Ok(payload),
        Some(_) => Err(PushError::validation("message is empty")),
        None => Err(PushError::validation("message must be a json object")),
    }
}

/// 发送 Slack 消息
pub async fn send(ctx: &PushContext, params: SendParams) -> Result<PushResult> {
    params.validate()?;
    let config = SlackConfig { url: params.url };

    let payload = build_payload(&params.data)?;
    let body = ctx
        .transport()
        .post_json(&config.webhook_url()?, &payload)
        .await?;
    if body.trim() != RESPONSE_OK {
        return Err(PushError::PlatformError(format!(
            "unexpected {} response: {body}",
            config.platform_name()
        )));
    }

    info!("{} webhook message sent", config.platform_name());
    Ok(PushResult::default())
}
