//! 接口调用凭证（access_token）
//!
//! 凭证在获取时记录到期时间，之后不再修改，刷新时整体替换。
//! 是否过期由调用方检查；`CredentialCache` 只在单次进程内复用凭证。

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::envelope::{ResponseEnvelope, WxResponse};
use crate::error::{PushError, Result};
use crate::transport::{HttpTransport, get_json_as};

/// 缓存中凭证提前失效的时间
const DEFAULT_REFRESH_SKEW_SECS: i64 = 60;

/// 接口调用凭证
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// 接口调用凭证
    pub access_token: String,
    /// 有效时间，单位：秒
    pub expires_in: i64,
    /// 到期时间
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// `expires_in` 超出时间范围时返回 `PlatformError`
    pub fn new(
        access_token: impl Into<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Result<Self> {
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                PushError::PlatformError(format!("invalid expires_in in response: {expires_in}"))
            })?;
        Ok(Self {
            access_token: access_token.into(),
            expires_in,
            expires_at,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// 过期时返回 `AuthError`
    pub fn ensure_valid(&self, now: DateTime<Utc>) -> Result<&str> {
        if self.is_valid_at(now) {
            Ok(&self.access_token)
        } else {
            Err(PushError::AuthError(format!(
                "access token expired at {}",
                self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            )))
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access_token: {:?}, expires_in: {}, expire_at: {:?}",
            self.access_token,
            self.expires_in,
            self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(flatten)]
    meta: WxResponse,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// 请求凭证接口并计算到期时间，不做重试
pub async fn acquire_token(transport: &dyn HttpTransport, url: &str) -> Result<Credential> {
    let resp: TokenResponse = get_json_as(transport, url).await?;
    let meta = resp.meta.into_result()?;
    if resp.access_token.is_empty() {
        return Err(PushError::PlatformError(format!(
            "access_token missing in response; {meta}"
        )));
    }
    Credential::new(resp.access_token, resp.expires_in, Utc::now())
}

/// 凭证接口
pub trait TokenEndpoint: Send + Sync {
    /// 平台名称，用作缓存键的一部分
    fn name(&self) -> &'static str;

    /// 凭证接口 URL（标识与密钥作为查询参数）
    fn token_url(&self, id: &str, secret: &str) -> Result<String>;
}

/// 凭证参数的命名，用于错误提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialFlags {
    pub access_token: &'static str,
    pub id: &'static str,
    pub secret: &'static str,
}

/// 凭证来源：直接给出的 access_token，或用于换取凭证的标识与密钥
#[derive(Clone, PartialEq, Eq)]
pub enum TokenSource {
    AccessToken(String),
    Secret { id: String, secret: String },
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken(_) => f.write_str("AccessToken(***)"),
            Self::Secret { id, .. } => f.debug_struct("Secret").field("id", id).finish_non_exhaustive(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TokenSource {
    /// access_token 优先；否则标识与密钥必须同时提供
    pub fn from_flags(
        access_token: Option<String>,
        id: Option<String>,
        secret: Option<String>,
        flags: CredentialFlags,
    ) -> Result<Self> {
        if let Some(token) = non_empty(access_token) {
            return Ok(Self::AccessToken(token));
        }
        match (non_empty(id), non_empty(secret)) {
            (Some(id), Some(secret)) => Ok(Self::Secret { id, secret }),
            (Some(_), None) => Err(PushError::validation(format!(
                "{} is required when {} is set",
                flags.secret, flags.id
            ))),
            _ => Err(PushError::validation(format!(
                "{} or {} and {} is required",
                flags.access_token, flags.id, flags.secret
            ))),
        }
    }
}

/// 进程内凭证缓存，按平台与标识区分
#[derive(Debug)]
pub struct CredentialCache {
    entries: Mutex<HashMap<String, Credential>>,
    refresh_skew: Duration,
}

impl Default for CredentialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            refresh_skew: Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
        }
    }

    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    fn cache_key(endpoint: &dyn TokenEndpoint, id: &str) -> String {
        format!("{}:{}", endpoint.name(), id)
    }

    /// 未过期（含提前量）的缓存凭证
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Credential> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|c| c.is_valid_at(now + self.refresh_skew))
            .cloned()
    }

    pub fn insert(&self, key: impl Into<String>, credential: Credential) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.into(), credential);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 命中缓存则复用，否则请求凭证接口
    pub async fn get_or_acquire(
        &self,
        transport: &dyn HttpTransport,
        endpoint: &dyn TokenEndpoint,
        id: &str,
        secret: &str,
    ) -> Result<Credential> {
        let key = Self::cache_key(endpoint, id);
        if let Some(credential) = self.get(&key, Utc::now()) {
            debug!("reuse cached {} access token for {}", endpoint.name(), id);
            return Ok(credential);
        }
        info!("acquire {} access token for {}", endpoint.name(), id);
        let url = endpoint.token_url(id, secret)?;
        let credential = acquire_token(transport, &url).await?;
        self.insert(key, credential.clone());
        Ok(credential)
    }

    /// 解析凭证来源，返回可用的 access_token
    pub async fn resolve(
        &self,
        transport: &dyn HttpTransport,
        endpoint: &dyn TokenEndpoint,
        source: &TokenSource,
    ) -> Result<String> {
        match source {
            TokenSource::AccessToken(token) => Ok(token.clone()),
            TokenSource::Secret { id, secret } => self
                .get_or_acquire(transport, endpoint, id, secret)
                .await
                .map(|c| c.access_token),
        }
    }
}
