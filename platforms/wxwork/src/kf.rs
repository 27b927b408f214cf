//! 微信客服发送消息
//!
//! 仅可在用户主动发消息后的 48 小时内发送，最多 5 条。

use std::fmt;

use common::envelope::ResponseEnvelope;
use common::message::{MediaMeta, TextMeta, msg_type};
use common::transport::post_json_as;
use common::validate::{ensure_items_range, ensure_msg_type, ensure_not_empty, parse_json};
use common::{PushContext, PushError, PushResult, Result, WxResponse};
use log::info;
use serde::{Deserialize, Serialize};

use crate::token::WorkTokenEndpoint;
use crate::{Auth, api_url};

const KF_SEND_PATH: &str = "kf/send_msg";

pub const KF_MSG_TYPES: [&str; 9] = [
    msg_type::TEXT,
    msg_type::IMAGE,
    msg_type::VOICE,
    msg_type::VIDEO,
    msg_type::FILE,
    msg_type::LINK,
    msg_type::MINI_PROGRAM,
    msg_type::MSG_MENU,
    msg_type::LOCATION,
];

/// 菜单项最多 10 个
pub const MAX_MENU_ITEMS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,
    pub url: String,
    pub thumb_media_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramMeta {
    pub appid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub thumb_media_id: String,
    pub pagepath: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMenuMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub head_content: String,
    pub list: Vec<MenuItem>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tail_content: String,
}

/// 菜单项，按 type 区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MenuItem {
    Click { click: MenuClick },
    View { view: MenuView },
    MiniProgram { miniprogram: MenuMiniProgram },
    Text { text: MenuText },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuClick {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuView {
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuMiniProgram {
    pub appid: String,
    pub pagepath: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuText {
    pub content: String,
    /// 0 换行，1 不换行
    #[serde(default)]
    pub no_newline: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KfBody {
    Text(TextMeta),
    Image(MediaMeta),
    Voice(MediaMeta),
    Video(MediaMeta),
    File(MediaMeta),
    Link(LinkMeta),
    MiniProgram(MiniProgramMeta),
    MsgMenu(MsgMenuMeta),
    Location(LocationMeta),
}

impl KfBody {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Text(_) => msg_type::TEXT,
            Self::Image(_) => msg_type::IMAGE,
            Self::Voice(_) => msg_type::VOICE,
            Self::Video(_) => msg_type::VIDEO,
            Self::File(_) => msg_type::FILE,
            Self::Link(_) => msg_type::LINK,
            Self::MiniProgram(_) => msg_type::MINI_PROGRAM,
            Self::MsgMenu(_) => msg_type::MSG_MENU,
            Self::Location(_) => msg_type::LOCATION,
        }
    }

    pub fn build(kind: &str, data: &str) -> Result<Self> {
        let body = match kind {
            msg_type::TEXT => Self::Text(TextMeta::new(data)),
            msg_type::IMAGE => Self::Image(MediaMeta::new(data)),
            msg_type::VOICE => Self::Voice(MediaMeta::new(data)),
            msg_type::VIDEO => Self::Video(MediaMeta::new(data)),
            msg_type::FILE => Self::File(MediaMeta::new(data)),
            msg_type::LINK => {
                let meta: LinkMeta = parse_json(data)?;
                ensure_not_empty("title", &meta.title)?;
                ensure_not_empty("url", &meta.url)?;
                ensure_not_empty("thumb_media_id", &meta.thumb_media_id)?;
                Self::Link(meta)
            }
            msg_type::MINI_PROGRAM => {
                let meta: MiniProgramMeta = parse_json(data)?;
                ensure_not_empty("appid", &meta.appid)?;
                ensure_not_empty("thumb_media_id", &meta.thumb_media_id)?;
                ensure_not_empty("pagepath", &meta.pagepath)?;
                Self::MiniProgram(meta)
            }
            msg_type::MSG_MENU => {
                let meta: MsgMenuMeta = parse_json(data)?;
                ensure_items_range("list", &meta.list, 1, MAX_MENU_ITEMS)?;
                Self::MsgMenu(meta)
            }
            msg_type::LOCATION => {
                let meta: LocationMeta = parse_json(data)?;
                if !(-90.0..=90.0).contains(&meta.latitude) {
                    return Err(PushError::validation("latitude is out of range [-90, 90]"));
                }
                if !(-180.0..=180.0).contains(&meta.longitude) {
                    return Err(PushError::validation("longitude is out of range [-180, 180]"));
                }
                Self::Location(meta)
            }
            other => {
                return Err(PushError::validation(format!(
                    "unsupported kf message type {other:?}"
                )));
            }
        };
        Ok(body)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KfMessage {
    pub touser: String,
    pub open_kfid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msgid: String,
    pub msgtype: String,
    #[serde(flatten)]
    pub body: KfBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KfResponse {
    #[serde(flatten)]
    pub meta: WxResponse,
    #[serde(default)]
    pub msgid: String,
}

impl ResponseEnvelope for KfResponse {
    fn code(&self) -> i64 {
        self.meta.errcode
    }

    fn message(&self) -> &str {
        &self.meta.errmsg
    }
}

impl fmt::Display for KfResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, msgid: {:?}", self.meta, self.msgid)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KfParams {
    pub auth: Auth,
    pub to_user: String,
    pub open_kf_id: String,
    pub msg_id: Option<String>,
    pub msg_type: String,
    pub data: String,
}

impl KfParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_not_empty("to_user", &self.to_user)?;
        ensure_not_empty("open_kfid", &self.open_kf_id)?;
        ensure_msg_type(&self.msg_type, &KF_MSG_TYPES)
    }
}

/// 发送微信客服消息
pub async fn send(ctx: &PushContext, params: KfParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let body = KfBody::build(&params.msg_type, &params.data)?;
    let message = KfMessage {
        touser: params.to_user,
        open_kfid: params.open_kf_id,
        msgid: params.msg_id.unwrap_or_default(),
        msgtype: body.msg_type().to_string(),
        body,
    };

    let access_token = ctx.access_token(&WorkTokenEndpoint, &source).await?;
    let url = api_url(KF_SEND_PATH, &access_token)?;
    let resp: KfResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("workweixin kf message sent by {}", message.open_kfid);
    Ok(PushResult::with_response(&resp).message_id(resp.msgid.clone()))
}
