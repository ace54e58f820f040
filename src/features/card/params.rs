use axum::http::{HeaderMap, Uri, header};
use reqwest::Url;

use crate::error::AppError;

pub const DEFAULT_NAME: &str = "Name";
pub const DEFAULT_TITLE: &str = "Title";

/// 卡片查询参数；同名参数只取第一次出现的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardParams {
    pub name: String,
    pub title: String,
    pub image: Option<String>,
}

impl CardParams {
    pub fn from_url(url: &Url) -> Self {
        let mut name = None;
        let mut title = None;
        let mut image = None;
        for (k, v) in url.query_pairs() {
            let slot = match k.as_ref() {
                "name" => &mut name,
                "title" => &mut title,
                "image" => &mut image,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(v.into_owned());
            }
        }
        Self {
            name: name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            image,
        }
    }
}

/// 还原请求的完整 URL，作为响应缓存键
///
/// 主机取自 Host 头；缺失或非法时使用配置的 `public_host`。
pub fn canonical_request_url(
    uri: &Uri,
    headers: &HeaderMap,
    fallback_host: &str,
) -> Result<Url, AppError> {
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let host = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    if let Some(host) = host {
        match Url::parse(&format!("http://{host}{path_and_query}")) {
            Ok(url) => return Ok(url),
            Err(e) => tracing::debug!("Host '{}' 无法构成 URL: {}", host, e),
        }
    }
    Url::parse(&format!("http://{fallback_host}{path_and_query}"))
        .map_err(|e| AppError::Internal(format!("无法构造请求 URL: {e}")))
}
