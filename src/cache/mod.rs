//! 分层缓存：内存层（moka，按字节加权）+ 可选 SQLite 持久层。
//!
//! 所有条目都归属于一个命名空间（字体 / emoji / 完整响应），同名 key 在不同命名空间互不干扰。
//! 同一 key 的写入只会整体覆盖，不做原地修改；并发写同一 key 时以最后一次为准。

mod sqlite;
mod store;

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

pub use sqlite::SqliteCacheStorage;
pub use store::{CacheStore, CacheTier};

/// 与 JavaScript `encodeURI` 相同的保留字符集
const URI_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// 按 `encodeURI` 规则编码，用于拼接缓存键与字体 CSS 请求地址
pub fn encode_uri(input: &str) -> String {
    utf8_percent_encode(input, URI_RESERVED).to_string()
}

/// 缓存命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// 字体文件字节，key 为字体族
    Font,
    /// emoji SVG，key 包含提供方配置与码点序列
    Emoji,
    /// 完整 HTTP 响应，key 为规范化请求 URL
    Response,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Font => "font",
            CacheNamespace::Emoji => "emoji",
            CacheNamespace::Response => "response",
        }
    }
}

/// 缓存条目：不透明字节 + 内容类型 + 需要原样回放的响应头
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            content_type: None,
            headers: Vec::new(),
            body: body.into(),
            stored_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// 以 UTF-8（有损）读取 body
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// 内存层权重：body 字节数（至少为 1）
    fn weight(&self) -> u32 {
        u32::try_from(self.body.len()).unwrap_or(u32::MAX).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::encode_uri;

    #[test]
    fn encode_uri_keeps_reserved_characters() {
        assert_eq!(encode_uri("Noto Sans JP"), "Noto%20Sans%20JP");
        assert_eq!(
            encode_uri(r#"[{"url":"https://a/b/"}]"#),
            "%5B%7B%22url%22:%22https://a/b/%22%7D%5D"
        );
        assert_eq!(encode_uri("日"), "%E6%97%A5");
    }
}
