//! 新增临时素材（公众号、小程序）

use std::fmt;
use std::path::PathBuf;

use common::envelope::ResponseEnvelope;
use common::transport::{post_file_as, with_query};
use common::validate::{ensure_file_exists, ensure_one_of};
use common::{PushContext, PushResult, Result, WxResponse};
use log::info;
use serde::Deserialize;

use crate::Auth;
use crate::token::WeixinTokenEndpoint;

const MEDIA_UPLOAD_URL: &str = "https://api.weixin.qq.com/cgi-bin/media/upload";

/// 素材类型
pub const MEDIA_TYPES: [&str; 4] = ["image", "voice", "video", "thumb"];

/// 上传表单字段名
const MEDIA_FIELD: &str = "media";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaUploadResponse {
    #[serde(flatten)]
    pub meta: WxResponse,
    #[serde(default, rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub media_id: String,
    #[serde(default)]
    pub created_at: i64,
}

impl ResponseEnvelope for MediaUploadResponse {
    fn code(&self) -> i64 {
        self.meta.errcode
    }

    fn message(&self) -> &str {
        &self.meta.errmsg
    }
}

impl fmt::Display for MediaUploadResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {:?}, media_id: {:?}, created_at: {}",
            self.media_type, self.media_id, self.created_at
        )
    }
}

/// 上传参数
#[derive(Debug, Clone, Default)]
pub struct MediaUploadParams {
    pub auth: Auth,
    pub media_type: String,
    pub file: PathBuf,
}

impl MediaUploadParams {
    pub fn validate(&self) -> Result<()> {
        self.auth.token_source()?;
        ensure_one_of("media_type", self.media_type.as_str(), &MEDIA_TYPES)?;
        ensure_file_exists(&self.file)
    }
}

/// 上传临时素材
pub async fn upload(ctx: &PushContext, params: MediaUploadParams) -> Result<PushResult> {
    params.validate()?;
    let source = params.auth.token_source()?;

    let access_token = ctx.access_token(&WeixinTokenEndpoint, &source).await?;
    let url = with_query(
        MEDIA_UPLOAD_URL,
        &[
            ("access_token", access_token.as_str()),
            ("type", params.media_type.as_str()),
        ],
    )?;
    let resp: MediaUploadResponse =
        post_file_as(ctx.transport(), &url, MEDIA_FIELD, &params.file).await?;
    let resp = resp.into_result()?;

    info!("weixin media uploaded: {}", resp.media_id);
    Ok(PushResult::with_response(&resp).message_id(resp.media_id.clone()))
}
