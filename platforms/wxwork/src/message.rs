//! 企业微信应用消息、群聊消息、家校消息共用的消息内容

use common::message::{MarkdownMeta, MediaMeta, TextMeta, msg_type};
use common::validate::{ensure_items_range, ensure_max_items, ensure_not_empty, parse_json};
use common::{PushError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 图文消息最多 8 条
pub const MAX_ARTICLES: usize = 8;
/// 小程序通知消息最多 10 个内容项
pub const MAX_CONTENT_ITEMS: usize = 10;

/// 视频
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub media_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// 文本卡片
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCardMeta {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub btntxt: String,
}

/// 图文（点击跳转到外链）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsMeta {
    pub articles: Vec<NewsArticle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub picurl: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub appid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pagepath: String,
}

/// 图文（图文消息存储在企业微信）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpNewsMeta {
    pub articles: Vec<MpNewsArticle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpNewsArticle {
    pub title: String,
    pub thumb_media_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_source_url: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
}

/// 小程序通知
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramNoticeMeta {
    pub appid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub page: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub emphasis_first_item: bool,
    #[serde(default)]
    pub content_item: Vec<ContentItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub key: String,
    pub value: String,
}

/// 消息内容，按 msgtype 区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkBody {
    Text(TextMeta),
    Image(MediaMeta),
    Voice(MediaMeta),
    Video(VideoMeta),
    File(MediaMeta),
    TextCard(TextCardMeta),
    News(NewsMeta),
    MpNews(MpNewsMeta),
    Markdown(MarkdownMeta),
    #[serde(rename = "miniprogram_notice")]
    MiniProgramNotice(MiniProgramNoticeMeta),
    #[serde(rename = "template_card")]
    TemplateCard(Value),
}

impl WorkBody {
    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Text(_) => msg_type::TEXT,
            Self::Image(_) => msg_type::IMAGE,
            Self::Voice(_) => msg_type::VOICE,
            Self::Video(_) => msg_type::VIDEO,
            Self::File(_) => msg_type::FILE,
            Self::TextCard(_) => msg_type::TEXT_CARD,
            Self::News(_) => msg_type::NEWS,
            Self::MpNews(_) => msg_type::MPNEWS,
            Self::Markdown(_) => msg_type::MARKDOWN,
            Self::MiniProgramNotice(_) => msg_type::MINI_PROGRAM_NOTICE,
            Self::TemplateCard(_) => msg_type::TEMPLATE_CARD,
        }
    }

    /// 按消息类型解析消息体，调用方需先校验消息类型是否在接口允许的范围内
    pub fn build(kind: &str, data: &str) -> Result<Self> {
        let body = match kind {
            msg_type::TEXT => Self::Text(TextMeta::new(data)),
            msg_type::MARKDOWN => Self::Markdown(MarkdownMeta {
                content: data.to_string(),
            }),
            msg_type::IMAGE => Self::Image(MediaMeta::new(data)),
            msg_type::VOICE => Self::Voice(MediaMeta::new(data)),
            msg_type::FILE => Self::File(MediaMeta::new(data)),
            msg_type::VIDEO => {
                let meta: VideoMeta = parse_json(data)?;
                ensure_not_empty("media_id", &meta.media_id)?;
                Self::Video(meta)
            }
            msg_type::TEXT_CARD => {
                let meta: TextCardMeta = parse_json(data)?;
                ensure_not_empty("title", &meta.title)?;
                ensure_not_empty("description", &meta.description)?;
                ensure_not_empty("url", &meta.url)?;
                Self::TextCard(meta)
            }
            msg_type::NEWS => {
                let meta: NewsMeta = parse_json(data)?;
                ensure_items_range("articles", &meta.articles, 1, MAX_ARTICLES)?;
                Self::News(meta)
            }
            msg_type::MPNEWS => {
                let meta: MpNewsMeta = parse_json(data)?;
                ensure_items_range("articles", &meta.articles, 1, MAX_ARTICLES)?;
                Self::MpNews(meta)
            }
            msg_type::MINI_PROGRAM_NOTICE => {
                let meta: MiniProgramNoticeMeta = parse_json(data)?;
                ensure_max_items("content_item", &meta.content_item, MAX_CONTENT_ITEMS)?;
                Self::MiniProgramNotice(meta)
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
                    "unsupported message type {other:?}"
                )));
            }
        };
        Ok(body)
    }
}
