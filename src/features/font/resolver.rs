use axum::body::Bytes;
use futures_util::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};

use crate::cache::{CacheEntry, CacheTier, encode_uri};
use crate::deferred::ExecutionContext;

use super::FontAsset;

static FONT_SRC_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"src: url\((.+)\) format\('(opentype|truetype)'\)").expect("valid font src regex")
});

/// 从字体 CSS 中取出第一个 opentype/truetype 字体文件地址
pub fn extract_font_url(css: &str) -> Option<&str> {
    FONT_SRC_PATTERN
        .captures(css)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Web 字体解析器：按字体族名解析字体文件，持久缓存、无 TTL
#[derive(Clone)]
pub struct FontResolver {
    client: Client,
    css_url: String,
    cache: CacheTier,
}

impl FontResolver {
    pub fn new(client: Client, css_url: impl Into<String>, cache: CacheTier) -> Self {
        Self {
            client,
            css_url: css_url.into(),
            cache,
        }
    }

    pub fn cache_key(font_name: &str) -> String {
        format!("http://font/{}", encode_uri(font_name))
    }

    /// 解析一组字体族；失败的字体族被直接丢弃，输出顺序与输入一致
    pub async fn resolve(&self, families: &[String], ctx: &ExecutionContext) -> Vec<FontAsset> {
        join_all(families.iter().map(|name| self.resolve_one(name, ctx)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn resolve_one(&self, font_name: &str, ctx: &ExecutionContext) -> Option<FontAsset> {
        let cache_key = Self::cache_key(font_name);
        if let Some(hit) = self.cache.lookup(&cache_key).await {
            return Some(FontAsset::regular(font_name, hit.body));
        }

        let data = self.download_font(font_name).await?;
        let cache = self.cache.clone();
        let entry = CacheEntry::new(data.clone());
        ctx.wait_until(async move {
            cache.put(&cache_key, entry).await;
        });
        Some(FontAsset::regular(font_name, data))
    }

    async fn download_font(&self, font_name: &str) -> Option<Bytes> {
        let css_url = format!("{}?family={}", self.css_url, encode_uri(font_name));
        let css = match self.client.get(&css_url).send().await {
            Ok(resp) => resp.text().await.ok()?,
            Err(e) => {
                tracing::warn!("字体 CSS 请求失败 '{}': {}", font_name, e);
                return None;
            }
        };
        let Some(font_url) = extract_font_url(&css) else {
            tracing::warn!("字体 CSS 中未找到 opentype/truetype 地址 '{}'", font_name);
            return None;
        };

        let resp = match self.client.get(font_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("字体文件请求失败 '{}': {}", font_name, e);
                return None;
            }
        };
        if resp.status() != StatusCode::OK {
            tracing::warn!("字体文件返回 {} '{}'", resp.status(), font_name);
            return None;
        }
        resp.bytes().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{FontResolver, extract_font_url};
    use crate::cache::{CacheNamespace, CacheStore};
    use crate::deferred::DeferredTasks;
    use crate::features::font::{FontStyle, FontWeight};
    use crate::test_support::{HitCounter, spawn_upstream};
    use axum::extract::{Path, Query};
    use axum::{Router, http::StatusCode, routing::get};
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn extracts_first_truetype_url() {
        let css = "@font-face {\n  font-family: 'Noto Sans';\n  src: url(https://fonts.example/a.ttf) format('truetype');\n}\n@font-face {\n  src: url(https://fonts.example/b.otf) format('opentype');\n}";
        assert_eq!(extract_font_url(css), Some("https://fonts.example/a.ttf"));
        assert_eq!(
            extract_font_url("src: url(https://x/a.woff2) format('woff2');"),
            None
        );
    }

    /// 假字体服务：`/css2?family=` 返回 CSS，`/files/:name` 返回字体字节；
    /// `Slow` 故意延迟响应，`Missing` 的字体文件返回 404，`Broken` 的 CSS 不含地址。
    async fn font_upstream(css_hits: &HitCounter) -> String {
        let css_hits = css_hits.clone();
        let router = Router::new()
            .route(
                "/css2",
                get(
                    move |Query(q): Query<HashMap<String, String>>,
                          headers: axum::http::HeaderMap| {
                        css_hits.hit();
                        async move {
                            let family = q.get("family").cloned().unwrap_or_default();
                            if family == "Slow" {
                                tokio::time::sleep(Duration::from_millis(80)).await;
                            }
                            if family == "Broken" {
                                return "body { color: red }".to_string();
                            }
                            let host = headers
                                .get("host")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string();
                            format!(
                                "@font-face {{\n  src: url(http://{host}/files/{}) format('truetype');\n}}",
                                family.replace(' ', "_")
                            )
                        }
                    },
                ),
            )
            .route(
                "/files/:name",
                get(|Path(name): Path<String>| async move {
                    if name == "Missing" {
                        (StatusCode::NOT_FOUND, Vec::new())
                    } else {
                        (StatusCode::OK, format!("FONT:{name}").into_bytes())
                    }
                }),
            );
        format!("{}/css2", spawn_upstream(router).await)
    }

    #[tokio::test]
    async fn second_resolution_is_served_from_cache() {
        let css_hits = HitCounter::default();
        let css_url = font_upstream(&css_hits).await;
        let resolver = FontResolver::new(
            reqwest::Client::new(),
            css_url,
            CacheStore::in_memory(1024 * 1024).namespace(CacheNamespace::Font),
        );
        let tasks = DeferredTasks::new();
        let families = vec!["Noto Sans".to_string(), "Noto Sans JP".to_string()];

        let ctx = tasks.context();
        let first = resolver.resolve(&families, &ctx).await;
        ctx.settle().await;
        assert_eq!(css_hits.count(), 2);

        let second = resolver.resolve(&families, &tasks.context()).await;
        assert_eq!(css_hits.count(), 2, "缓存命中时不应再请求 CSS");
        assert_eq!(first, second);
        assert_eq!(first[0].data.as_ref(), b"FONT:Noto_Sans");
        assert_eq!(first[0].weight, FontWeight::Regular);
        assert_eq!(first[0].weight.value(), 400);
        assert_eq!(first[0].style, FontStyle::Normal);
    }

    #[tokio::test]
    async fn failed_families_are_dropped_and_order_is_kept() {
        let css_hits = HitCounter::default();
        let css_url = font_upstream(&css_hits).await;
        let resolver = FontResolver::new(
            reqwest::Client::new(),
            css_url,
            CacheStore::in_memory(1024 * 1024).namespace(CacheNamespace::Font),
        );
        let families: Vec<String> = ["Slow", "Missing", "Fast", "Broken", "Last"]
            .into_iter()
            .map(String::from)
            .collect();
        let ctx = DeferredTasks::new().context();
        let fonts = resolver.resolve(&families, &ctx).await;
        let names: Vec<&str> = fonts.iter().map(|f| f.name.as_str()).collect();
        // Slow 最后完成，但仍排在第一位
        assert_eq!(names, vec!["Slow", "Fast", "Last"]);
        // 只有成功的字体会调度缓存写入
        assert!(ctx.pending() <= 3);
    }

    #[tokio::test]
    async fn unreachable_provider_yields_nothing() {
        let resolver = FontResolver::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/css2",
            CacheStore::in_memory(1024).namespace(CacheNamespace::Font),
        );
        let fonts = resolver
            .resolve(&["Noto Sans".to_string()], &DeferredTasks::new().context())
            .await;
        assert!(fonts.is_empty());
    }

    #[test]
    fn cache_key_uses_encoded_family() {
        assert_eq!(FontResolver::cache_key("Noto Sans JP"), "http://font/Noto%20Sans%20JP");
    }
}
