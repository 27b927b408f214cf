//! 微信系接口共用的消息类型与消息内容

use serde::{Deserialize, Serialize};

/// 消息类型（msgtype）取值
pub mod msg_type {
    pub const TEXT: &str = "text";
    pub const IMAGE: &str = "image";
    pub const VOICE: &str = "voice";
    pub const VIDEO: &str = "video";
    pub const FILE: &str = "file";
    pub const MUSIC: &str = "music";
    pub const NEWS: &str = "news";
    pub const MPNEWS: &str = "mpnews";
    pub const MPNEWS_ARTICLE: &str = "mpnewsarticle";
    pub const MSG_MENU: &str = "msgmenu";
    pub const WX_CARD: &str = "wxcard";
    pub const MINI_PROGRAM_PAGE: &str = "miniprogrampage";
    pub const MINI_PROGRAM: &str = "miniprogram";
    pub const MINI_PROGRAM_NOTICE: &str = "miniprogram_notice";
    pub const LINK: &str = "link";
    pub const TEXT_CARD: &str = "textcard";
    pub const MARKDOWN: &str = "markdown";
    pub const TEMPLATE_CARD: &str = "template_card";
    pub const LOCATION: &str = "location";
}

/// 文本
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMeta {
    pub content: String,
}

impl TextMeta {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// 素材（图片、语音、文件等）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMeta {
    pub media_id: String,
}

impl MediaMeta {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
        }
    }
}

/// Markdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownMeta {
    pub content: String,
}
