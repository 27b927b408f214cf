//! 家校消息推送（外部联系人）

use std::fmt;

use common::envelope::ResponseEnvelope;
use common::message::msg_type;
use common::transport::post_json_as;
use common::validate::{ensure_max_items, ensure_msg_type, ensure_one_of};
use common::{PushContext, PushError, PushResult, Result, WxResponse};
use log::info;
use serde::{Deserialize, Serialize};

use crate::message::WorkBody;
use crate::token::WorkTokenEndpoint;
use crate::{Auth, DeliveryOptions, api_url};

const EXTERNAL_CONTACT_SEND_PATH: &str = "externalcontact/message/send";

pub const MAX_TO_PARENT: usize = 1000;
pub const MAX_TO_STUDENT: usize = 1000;
pub const MAX_TO_PARTY: usize = 100;

pub const EXTERNAL_CONTACT_MSG_TYPES: [&str; 8] = [
    msg_type::TEXT,
    msg_type::IMAGE,
    msg_type::VOICE,
    msg_type::VIDEO,
    msg_type::FILE,
    msg_type::NEWS,
    msg_type::MPNEWS,
    msg_type::MINI_PROGRAM_NOTICE,
];

/// 接收范围：0 发送给学生及家长，1 仅学生，2 仅家长
pub const RECV_SCOPES: [i64; 3] = [0, 1, 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalContactMessage {
    #[serde(default)]
    pub recv_scope: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_parent_userid: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_student_userid: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_party: Vec<String>,
    #[serde(default)]
    pub toall: i64,
    pub msgtype: String,
    pub agentid: i64,
    #[serde(flatten)]
    pub options: DeliveryOptions,
    #[serde(flatten)]
    pub body: WorkBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalContactResponse {
    #[serde(flatten)]
    pub meta: WxResponse,
    #[serde(default)]
    pub invalid_parent_userid: Vec<String>,
    #[serde(default)]
    pub invalid_student_userid: Vec<String>,
    #[serde(default)]
    pub invalid_party: Vec<String>,
}

impl ResponseEnvelope for ExternalContactResponse {
    fn code(&self) -> i64 {
        self.meta.errcode
    }

    fn message(&self) -> &str {
        &self.meta.errmsg
    }
}

impl fmt::Display for ExternalContactResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.meta)?;
        for (name, value) in [
            ("invalid_parent_userid", &self.invalid_parent_userid),
            ("invalid_student_userid", &self.invalid_student_userid),
            ("invalid_party", &self.invalid_party),
        ] {
            if !value.is_empty() {
                write!(f, ", {name}: {value:?}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExternalContactParams {
    pub auth: Auth,
    pub recv_scope: i64,
    pub to_parent_user_id: Vec<String>,
    pub to_student_user_id: Vec<String>,
    pub to_party: Vec<String>,
    pub to_all: i64,
    pub agent_id: i64,
    pub msg_type: String,
    pub options: DeliveryOptions,
    pub data: String,
}

impl ExternalContactParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_max_items("to_parent_userid", &self.to_parent_user_id, MAX_TO_PARENT)?;
        ensure_max_items("to_student_userid", &self.to_student_user_id, MAX_TO_STUDENT)?;
        ensure_max_items("to_party", &self.to_party, MAX_TO_PARTY)?;
        ensure_one_of("recv_scope", self.recv_scope, &RECV_SCOPES)?;
        ensure_one_of("toall", self.to_all, &[0, 1])?;
        if self.to_all == 0
            && self.to_parent_user_id.is_empty()
            && self.to_student_user_id.is_empty()
            && self.to_party.is_empty()
        {
            return Err(PushError::validation(
                "to_parent_userid, to_student_userid, to_party cannot be empty when toall is 0",
            ));
        }
        self.options.validate()?;
        ensure_msg_type(&self.msg_type, &EXTERNAL_CONTACT_MSG_TYPES)
    }
}

/// 发送家校消息
pub async fn send(ctx: &PushContext, params: ExternalContactParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let body = WorkBody::build(&params.msg_type, &params.data)?;
    let message = ExternalContactMessage {
        recv_scope: params.recv_scope,
        to_parent_userid: params.to_parent_user_id,
        to_student_userid: params.to_student_user_id,
        to_party: params.to_party,
        toall: params.to_all,
        msgtype: body.msg_type().to_string(),
        agentid: params.agent_id,
        options: params.options,
        body,
    };

    let access_token = ctx.access_token(&WorkTokenEndpoint, &source).await?;
    let url = api_url(EXTERNAL_CONTACT_SEND_PATH, &access_token)?;
    let resp: ExternalContactResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("workweixin external contact message sent, agent {}", message.agentid);
    Ok(PushResult::with_response(resp))
}
