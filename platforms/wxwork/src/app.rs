//! 企业微信应用消息与撤回

use std::fmt;

use common::envelope::ResponseEnvelope;
use common::message::msg_type;
use common::transport::post_json_as;
use common::validate::{ensure_max_items, ensure_msg_type, ensure_not_empty, ensure_one_of};
use common::{PushContext, PushError, PushResult, Result, WxResponse};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::message::WorkBody;
use crate::token::WorkTokenEndpoint;
use crate::{Auth, DeliveryOptions, api_url};

const APP_SEND_PATH: &str = "message/send";
const APP_RECALL_PATH: &str = "message/recall";

pub const MAX_TO_USER: usize = 1000;
pub const MAX_TO_PARTY: usize = 100;
pub const MAX_TO_TAG: usize = 100;

/// 应用消息支持的消息类型
pub const APP_MSG_TYPES: [&str; 11] = [
    msg_type::TEXT,
    msg_type::IMAGE,
    msg_type::VOICE,
    msg_type::VIDEO,
    msg_type::FILE,
    msg_type::TEXT_CARD,
    msg_type::NEWS,
    msg_type::MPNEWS,
    msg_type::MARKDOWN,
    msg_type::MINI_PROGRAM_NOTICE,
    msg_type::TEMPLATE_CARD,
];

/// 保密消息，0表示可对外分享，1表示不能分享且内容显示水印，2表示仅限在企业内分享（仅mpnews）
pub const SAFE_LEVELS: [i64; 3] = [0, 1, 2];

/// 应用消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMessage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub touser: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub toparty: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub totag: String,
    pub msgtype: String,
    pub agentid: i64,
    #[serde(default)]
    pub safe: i64,
    #[serde(flatten)]
    pub options: DeliveryOptions,
    #[serde(flatten)]
    pub body: WorkBody,
}

/// 应用消息响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppResponse {
    #[serde(flatten)]
    pub meta: WxResponse,
    #[serde(default)]
    pub invaliduser: String,
    #[serde(default)]
    pub invalidparty: String,
    #[serde(default)]
    pub invalidtag: String,
    #[serde(default)]
    pub unlicenseduser: String,
    #[serde(default)]
    pub msgid: String,
    #[serde(default)]
    pub response_code: String,
}

impl ResponseEnvelope for AppResponse {
    fn code(&self) -> i64 {
        self.meta.errcode
    }

    fn message(&self) -> &str {
        &self.meta.errmsg
    }
}

impl fmt::Display for AppResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msgid: {:?}", self.msgid)?;
        for (name, value) in [
            ("invaliduser", &self.invaliduser),
            ("invalidparty", &self.invalidparty),
            ("invalidtag", &self.invalidtag),
            ("unlicenseduser", &self.unlicenseduser),
            ("response_code", &self.response_code),
        ] {
            if !value.is_empty() {
                write!(f, ", {name}: {value:?}")?;
            }
        }
        Ok(())
    }
}

/// 应用消息参数
#[derive(Debug, Clone, Default)]
pub struct AppParams {
    pub auth: Auth,
    pub to_user: Vec<String>,
    pub to_party: Vec<String>,
    pub to_tag: Vec<String>,
    pub agent_id: i64,
    pub msg_type: String,
    pub safe: i64,
    pub options: DeliveryOptions,
    pub data: String,
}

impl AppParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        if self.to_user.is_empty() && self.to_party.is_empty() && self.to_tag.is_empty() {
            return Err(PushError::validation(
                "to_user, to_party, to_tag cannot be empty at the same time",
            ));
        }
        ensure_max_items("to_user", &self.to_user, MAX_TO_USER)?;
        ensure_max_items("to_party", &self.to_party, MAX_TO_PARTY)?;
        ensure_max_items("to_tag", &self.to_tag, MAX_TO_TAG)?;
        ensure_msg_type(&self.msg_type, &APP_MSG_TYPES)?;
        ensure_one_of("safe", self.safe, &SAFE_LEVELS)?;
        if self.safe == 2 && self.msg_type != msg_type::MPNEWS {
            return Err(PushError::validation("safe 2 is only supported by mpnews"));
        }
        self.options.validate()
    }
}

/// 发送应用消息
pub async fn send(ctx: &PushContext, params: AppParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let body = WorkBody::build(&params.msg_type, &params.data)?;
    let message = AppMessage {
        touser: params.to_user.join("|"),
        toparty: params.to_party.join("|"),
        totag: params.to_tag.join("|"),
        msgtype: body.msg_type().to_string(),
        agentid: params.agent_id,
        safe: params.safe,
        options: params.options,
        body,
    };
    debug!("workweixin app message: {}", message.msgtype);

    let access_token = ctx.access_token(&WorkTokenEndpoint, &source).await?;
    let url = api_url(APP_SEND_PATH, &access_token)?;
    let resp: AppResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("workweixin app message sent, agent {}", message.agentid);
    Ok(PushResult::with_response(&resp).message_id(resp.msgid.clone()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct RecallRequest<'a> {
    msgid: &'a str,
}

/// 撤回应用消息参数
#[derive(Debug, Clone, Default)]
pub struct RecallParams {
    pub auth: Auth,
    pub msg_id: String,
}

impl RecallParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_not_empty("msg_id", &self.msg_id)
    }
}

/// 撤回24小时内通过应用发送的消息
pub async fn recall(ctx: &PushContext, params: RecallParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let access_token = ctx.access_token(&WorkTokenEndpoint, &source).await?;
    let url = api_url(APP_RECALL_PATH, &access_token)?;
    let request = RecallRequest {
        msgid: &params.msg_id,
    };
    let resp: WxResponse = post_json_as(ctx.transport(), &url, &request).await?;
    let resp = resp.into_result()?;

    info!("workweixin app message recalled: {}", params.msg_id);
    Ok(PushResult::with_response(resp))
}
