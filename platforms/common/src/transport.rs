use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, Url, multipart};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::envelope::decode_json;
use crate::error::{PushError, Result};

const SENSITIVE_QUERY_KEYS: [&str; 4] = ["access_token", "key", "secret", "corpsecret"];
/// 其后的路径即为凭证：飞书 `/bot/v2/hook/<token>`，Slack `/services/<T>/<B>/<secret>`
const SENSITIVE_PATH_SEGMENTS: [&str; 2] = ["hook", "services"];

/// HTTP 传输层，非 2xx 响应统一转换为 `TransportError`
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET 请求，返回响应体
    async fn get(&self, url: &str) -> Result<String>;

    /// 以 JSON 编码 POST 请求体，返回响应体
    async fn post_json(&self, url: &str, body: &Value) -> Result<String>;

    /// multipart/form-data 上传文件，返回响应体
    async fn post_file(&self, url: &str, field_name: &str, path: &Path) -> Result<String>;
}

/// HTTP 客户端配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    /// User-Agent 请求头
    pub user_agent: Option<String>,
    /// 请求超时（秒），不设置时使用 reqwest 默认行为
    pub timeout: Option<u64>,
}

/// 基于 reqwest 的传输实现
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(user_agent) = config.user_agent.as_deref().filter(|v| !v.is_empty()) {
            builder = builder.user_agent(user_agent.to_string());
        }
        if let Some(secs) = config.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| PushError::ConfigError(format!("failed to build http client: {e}")))?;
        Ok(Self { http_client })
    }
}

fn network_error(method: &str, url: &str, err: reqwest::Error) -> PushError {
    PushError::NetworkError(format!("{method} {}, {}", redact_url(url), err.without_url()))
}

async fn read_body(method: &str, url: &str, response: Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(PushError::TransportError {
            method: method.to_string(),
            url: redact_url(url),
            status: status.as_u16(),
        });
    }
    response
        .text()
        .await
        .map_err(|e| network_error(method, url, e))
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error("GET", url, e))?;
        read_body("GET", url, response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<String> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| network_error("POST", url, e))?;
        read_body("POST", url, response).await
    }

    async fn post_file(&self, url: &str, field_name: &str, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PushError::ConfigError(format!("read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let form = multipart::Form::new().part(
            field_name.to_string(),
            multipart::Part::bytes(bytes).file_name(file_name),
        );
        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network_error("POST", url, e))?;
        read_body("POST", url, response).await
    }
}

/// 拼接查询参数
pub fn with_query(base: &str, params: &[(&str, &str)]) -> Result<String> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| PushError::ConfigError(format!("invalid url {base}: {e}")))
}

/// 隐去 URL 中的凭证参数与凭证路径，用于日志与错误信息
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let path = redacted_path(&parsed);
    if path.is_none() && parsed.query().is_none() {
        return url.to_string();
    }
    if let Some(path) = path {
        parsed.set_path(&path);
    }
    if parsed.query().is_some() {
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| {
                let value = if SENSITIVE_QUERY_KEYS.contains(&k.as_ref()) {
                    "***".to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), value)
            })
            .collect();
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parsed.to_string()
}

fn redacted_path(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    let pos = segments
        .iter()
        .position(|s| SENSITIVE_PATH_SEGMENTS.contains(s))?;
    if pos + 1 >= segments.len() {
        return None;
    }
    let mut kept = segments[..=pos].to_vec();
    kept.push("***");
    Some(format!("/{}", kept.join("/")))
}

pub async fn get_json_as<T: DeserializeOwned>(transport: &dyn HttpTransport, url: &str) -> Result<T> {
    debug!("GET {}", redact_url(url));
    let body = transport.get(url).await?;
    decode_json(&body)
}

pub async fn post_json_as<T, B>(transport: &dyn HttpTransport, url: &str, body: &B) -> Result<T>
where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
{
    let payload = serde_json::to_value(body).map_err(|e| PushError::payload(e.to_string()))?;
    debug!("POST {} {}", redact_url(url), payload);
    let body = transport.post_json(url, &payload).await?;
    decode_json(&body)
}

pub async fn post_file_as<T: DeserializeOwned>(
    transport: &dyn HttpTransport,
    url: &str,
    field_name: &str,
    path: &Path,
) -> Result<T> {
    debug!("POST {} file={}", redact_url(url), path.display());
    let body = transport.post_file(url, field_name, path).await?;
    decode_json(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&TransportConfig::default()).unwrap()
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://api.weixin.qq.com/cgi-bin/media/upload?access_token=abc&type=image"),
            "https://api.weixin.qq.com/cgi-bin/media/upload?access_token=***&type=image"
        );
        assert_eq!(redact_url("https://hooks.slack.com/x"), "https://hooks.slack.com/x");
        assert_eq!(
            redact_url("https://hooks.slack.com/services/T000/B000/XXXXXXXX"),
            "https://hooks.slack.com/services/***"
        );
        assert_eq!(
            redact_url("https://open.feishu.cn/open-apis/bot/v2/hook/f6a1-token"),
            "https://open.feishu.cn/open-apis/bot/v2/hook/***"
        );
        assert_eq!(
            redact_url("https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=k1"),
            "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=***"
        );
        assert_eq!(redact_url("not a url"), "not a url");
    }

    #[test]
    fn test_with_query() {
        let url = with_query("https://qyapi.weixin.qq.com/cgi-bin/gettoken", &[("corpid", "c 1"), ("corpsecret", "s")]).unwrap();
        assert_eq!(url, "https://qyapi.weixin.qq.com/cgi-bin/gettoken?corpid=c+1&corpsecret=s");
        assert!(with_query("::", &[]).is_err());
    }

    #[tokio::test]
    async fn test_get_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(query_param("appid", "id"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"errcode":0}"#))
            .mount(&server)
            .await;

        let body = transport()
            .get(&format!("{}/token?appid=id", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, r#"{"errcode":0}"#);
    }

    #[tokio::test]
    async fn test_non_2xx_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = format!("{}/send?access_token=secret", server.uri());
        let err = transport().post_json(&url, &json!({})).await.unwrap_err();
        match err {
            PushError::TransportError { method, url, status } => {
                assert_eq!(method, "POST");
                assert_eq!(status, 503);
                assert!(url.ends_with("/send?access_token=***"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_hides_hook_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/open-apis/bot/v2/hook/f6a1-token", server.uri());
        let err = transport().post_json(&url, &json!({})).await.unwrap_err();
        assert!(!err.to_string().contains("f6a1-token"));
        assert!(err.to_string().contains("/hook/***"));
    }

    #[tokio::test]
    async fn test_post_json_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_json(json!({"msgtype": "text", "text": {"content": "<b>hi</b>"}})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let body = transport()
            .post_json(
                &format!("{}/send", server.uri()),
                &json!({"msgtype": "text", "text": {"content": "<b>hi</b>"}}),
            )
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_post_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"media_id":"m"}"#))
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();

        let body = transport()
            .post_file(&format!("{}/upload", server.uri()), "media", file.path())
            .await
            .unwrap();
        assert_eq!(body, r#"{"media_id":"m"}"#);
    }

    #[tokio::test]
    async fn test_post_missing_file() {
        let err = transport()
            .post_file("http://127.0.0.1:1/upload", "media", Path::new("/no/such/file"))
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::ConfigError(_)));
    }
}
