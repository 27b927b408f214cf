//! 客服消息（公众号、小程序）

use common::envelope::ResponseEnvelope;
use common::message::{MediaMeta, TextMeta, msg_type};
use common::transport::post_json_as;
use common::validate::{ensure_msg_type, ensure_not_empty, parse_json};
use common::{PushContext, PushError, PushResult, Result, WxResponse};
use log::info;
use serde::{Deserialize, Serialize};

use crate::token::WeixinTokenEndpoint;
use crate::{Auth, api_url};

const CUSTOMER_SEND_PATH: &str = "message/custom/send";

/// 公众号客服消息类型
pub const OFFICIAL_ACCOUNT_MSG_TYPES: [&str; 11] = [
    msg_type::TEXT,
    msg_type::IMAGE,
    msg_type::VOICE,
    msg_type::VIDEO,
    msg_type::MUSIC,
    msg_type::NEWS,
    msg_type::MPNEWS,
    msg_type::MPNEWS_ARTICLE,
    msg_type::MSG_MENU,
    msg_type::WX_CARD,
    msg_type::MINI_PROGRAM_PAGE,
];

/// 小程序客服消息类型
pub const MINI_PROGRAM_MSG_TYPES: [&str; 4] = [
    msg_type::TEXT,
    msg_type::IMAGE,
    msg_type::LINK,
    msg_type::MINI_PROGRAM_PAGE,
];

/// 发送方
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CustomerScope {
    #[default]
    OfficialAccount,
    MiniProgram,
}

impl CustomerScope {
    pub fn msg_types(self) -> &'static [&'static str] {
        match self {
            Self::OfficialAccount => &OFFICIAL_ACCOUNT_MSG_TYPES,
            Self::MiniProgram => &MINI_PROGRAM_MSG_TYPES,
        }
    }
}

/// 视频
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub media_id: String,
    #[serde(default)]
    pub thumb_media_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// 音乐
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub musicurl: String,
    #[serde(default)]
    pub hqmusicurl: String,
    pub thumb_media_id: String,
}

/// 图文（点击跳转到外链）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsMeta {
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub picurl: String,
}

/// 图文消息（点击跳转到图文消息页面），使用“发布”接口得到的 article_id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpNewsArticleMeta {
    pub article_id: String,
}

/// 菜单消息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMenuMeta {
    #[serde(default)]
    pub head_content: String,
    pub list: Vec<MsgMenuItem>,
    #[serde(default)]
    pub tail_content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMenuItem {
    pub id: String,
    pub content: String,
}

/// 卡券，仅支持非自定义 Code 码和导入 code 模式的卡券
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WxCardMeta {
    pub card_id: String,
}

/// 小程序卡片
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramPageMeta {
    pub title: String,
    /// 小程序发送时不需要填写
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub appid: String,
    pub pagepath: String,
    pub thumb_media_id: String,
}

/// 图文链接（小程序）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMeta {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub thumb_url: String,
}

/// 客服消息内容，按 msgtype 区分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerBody {
    Text(TextMeta),
    Image(MediaMeta),
    Voice(MediaMeta),
    Video(VideoMeta),
    Music(MusicMeta),
    News(NewsMeta),
    MpNews(MediaMeta),
    MpNewsArticle(MpNewsArticleMeta),
    MsgMenu(MsgMenuMeta),
    WxCard(WxCardMeta),
    MiniProgramPage(MiniProgramPageMeta),
    Link(LinkMeta),
}

impl CustomerBody {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Text(_) => msg_type::TEXT,
            Self::Image(_) => msg_type::IMAGE,
            Self::Voice(_) => msg_type::VOICE,
            Self::Video(_) => msg_type::VIDEO,
            Self::Music(_) => msg_type::MUSIC,
            Self::News(_) => msg_type::NEWS,
            Self::MpNews(_) => msg_type::MPNEWS,
            Self::MpNewsArticle(_) => msg_type::MPNEWS_ARTICLE,
            Self::MsgMenu(_) => msg_type::MSG_MENU,
            Self::WxCard(_) => msg_type::WX_CARD,
            Self::MiniProgramPage(_) => msg_type::MINI_PROGRAM_PAGE,
            Self::Link(_) => msg_type::LINK,
        }
    }

    /// 按消息类型解析消息体；简单类型直接使用原始字符串
    pub fn build(kind: &str, data: &str) -> Result<Self> {
        let body = match kind {
            msg_type::TEXT => Self::Text(TextMeta::new(data)),
            msg_type::IMAGE => Self::Image(MediaMeta::new(data)),
            msg_type::VOICE => Self::Voice(MediaMeta::new(data)),
            msg_type::MPNEWS => Self::MpNews(MediaMeta::new(data)),
            msg_type::MPNEWS_ARTICLE => Self::MpNewsArticle(MpNewsArticleMeta {
                article_id: data.to_string(),
            }),
            msg_type::WX_CARD => Self::WxCard(WxCardMeta {
                card_id: data.to_string(),
            }),
            msg_type::VIDEO => {
                let meta: VideoMeta = parse_json(data)?;
                ensure_not_empty("media_id", &meta.media_id)?;
                Self::Video(meta)
            }
            msg_type::MUSIC => {
                let meta: MusicMeta = parse_json(data)?;
                ensure_not_empty("thumb_media_id", &meta.thumb_media_id)?;
                Self::Music(meta)
            }
            msg_type::NEWS => {
                let meta: NewsMeta = parse_json(data)?;
                if meta.articles.len() != 1 {
                    return Err(PushError::validation("length of articles must be 1"));
                }
                Self::News(meta)
            }
            msg_type::MSG_MENU => {
                let meta: MsgMenuMeta = parse_json(data)?;
                if meta.list.is_empty() {
                    return Err(PushError::validation("list is empty"));
                }
                Self::MsgMenu(meta)
            }
            msg_type::MINI_PROGRAM_PAGE => {
                let meta: MiniProgramPageMeta = parse_json(data)?;
                ensure_not_empty("title", &meta.title)?;
                ensure_not_empty("pagepath", &meta.pagepath)?;
                ensure_not_empty("thumb_media_id", &meta.thumb_media_id)?;
                Self::MiniProgramPage(meta)
            }
            msg_type::LINK => {
                let meta: LinkMeta = parse_json(data)?;
                ensure_not_empty("title", &meta.title)?;
                ensure_not_empty("url", &meta.url)?;
                ensure_not_empty("thumb_url", &meta.thumb_url)?;
                Self::Link(meta)
            }
            other => {
                return Err(PushError::validation(format!(
                    "unsupported customer message type {other:?}"
                )));
            }
        };
        Ok(body)
    }
}

/// 以某个客服账号发送
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMeta {
    pub kf_account: String,
}

/// 客服消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerMessage {
    pub touser: String,
    pub msgtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customservice: Option<ServiceMeta>,
    #[serde(flatten)]
    pub body: CustomerBody,
}

impl CustomerMessage {
    pub fn new(touser: impl Into<String>, body: CustomerBody, kf_account: Option<String>) -> Self {
        Self {
            touser: touser.into(),
            msgtype: body.msg_type().to_string(),
            customservice: kf_account.map(|kf_account| ServiceMeta { kf_account }),
            body,
        }
    }
}

/// 客服消息参数
#[derive(Debug, Clone, Default)]
pub struct CustomerParams {
    pub auth: Auth,
    pub scope: CustomerScope,
    pub to_user: String,
    pub msg_type: String,
    pub kf_account: Option<String>,
    pub data: String,
}

impl CustomerParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_not_empty("to_user", &self.to_user)?;
        ensure_msg_type(&self.msg_type, self.scope.msg_types())?;
        if self.scope == CustomerScope::MiniProgram && self.kf_account.is_some() {
            return Err(PushError::validation(
                "kf_account is not supported by mini program customer messages",
            ));
        }
        Ok(())
    }
}

/// 发送客服消息
pub async fn send(ctx: &PushContext, params: CustomerParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let body = CustomerBody::build(&params.msg_type, &params.data)?;
    let kf_account = params.kf_account.filter(|v| !v.is_empty());
    let message = CustomerMessage::new(params.to_user, body, kf_account);

    let access_token = ctx.access_token(&WeixinTokenEndpoint, &source).await?;
    let url = api_url(CUSTOMER_SEND_PATH, &access_token)?;
    let resp: WxResponse = post_json_as(ctx.transport(), &url, &message).await?;
    let resp = resp.into_result()?;

    info!("weixin customer message sent to {}", message.touser);
    Ok(PushResult::with_response(resp))
}
