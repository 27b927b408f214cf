//! 小程序订阅消息

use std::collections::BTreeMap;

use common::envelope::ResponseEnvelope;
use common::transport::post_json_as;
use common::validate::{ensure_not_empty, ensure_one_of, parse_json};
use common::{PushContext, PushError, PushResult, Result, WxResponse};
use log::info;
use serde::{Deserialize, Serialize};

use crate::token::WeixinTokenEndpoint;
use crate::{Auth, api_url};

const SUBSCRIBE_SEND_PATH: &str = "message/subscribe/send";

/// 跳转小程序类型：开发版、体验版、正式版
pub const MINI_PROGRAM_STATES: [&str; 3] = ["developer", "trial", "formal"];

/// 进入小程序查看的语言类型
pub const LANGUAGES: [&str; 4] = ["zh_CN", "en_US", "zh_HK", "zh_TW"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeDataItem {
    pub value: String,
}

/// 小程序订阅消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeMessage {
    pub touser: String,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub miniprogram_state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lang: String,
    pub data: BTreeMap<String, SubscribeDataItem>,
}

/// 小程序订阅消息参数
#[derive(Debug, Clone, Default)]
pub struct SubscribeParams {
    pub auth: Auth,
    pub to_user: String,
    pub template_id: String,
    pub page: Option<String>,
    pub mini_program_state: Option<String>,
    pub lang: Option<String>,
    pub data: String,
}

impl SubscribeParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_not_empty("to_user", &self.to_user)?;
        ensure_not_empty("template_id", &self.template_id)?;
        if let Some(state) = self.mini_program_state.as_deref() {
            ensure_one_of("miniprogram_state", state, &MINI_PROGRAM_STATES)?;
        }
        if let Some(lang) = self.lang.as_deref() {
            ensure_one_of("lang", lang, &LANGUAGES)?;
        }
        Ok(())
    }
}

/// 发送小程序订阅消息
pub async fn send(ctx: &PushContext, params: SubscribeParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let data: BTreeMap<String, SubscribeDataItem> = parse_json(&params.data)?;
    if data.is_empty() {
        return Err(PushError::validation("template data is empty"));
    }
    let message = SubscribeMessage {
        touser: params.to_user,
        template_id: params.template_id,
        page: params.page.unwrap_or_default(),
        miniprogram_state: params.mini_program_state.unwrap_or_default(),
        lang: params.lang.unwrap_or_default(),
        data,
    };

    let access_token = ctx.access_token(&WeixinTokenEndpoint, &source).await?;
    let url = api_url(SUBSCRIBE_SEND_PATH, &access_token)?;
    let resp: WxResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("weixin mini program subscribe message sent to {}", message.touser);
    Ok(PushResult::with_response(resp))
}
