use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use reqwest::{Client, StatusCode, header};

use crate::cache::{CacheEntry, CacheTier, encode_uri};
use crate::deferred::ExecutionContext;
use crate::features::render::{AssetKind, AssetLoader, AssetResolution};

use super::{EmojiProvider, EmojiQuery};

/// emoji 解析器：缓存优先，未命中时按声明顺序逐个尝试提供方
#[derive(Clone)]
pub struct EmojiResolver {
    client: Client,
    providers: Arc<Vec<EmojiProvider>>,
    cache: CacheTier,
    key_prefix: String,
}

impl EmojiResolver {
    pub fn new(client: Client, providers: Vec<EmojiProvider>, cache: CacheTier) -> Self {
        // 缓存键包含完整的提供方配置：调整顺序或地址后旧条目不再可达（不会被主动失效）。
        let serialized = serde_json::to_string(&providers).unwrap_or_else(|_| "[]".to_string());
        Self {
            client,
            key_prefix: format!("http://emoji/{}/", encode_uri(&serialized)),
            providers: Arc::new(providers),
            cache,
        }
    }

    pub fn cache_key(&self, code_key: &str) -> String {
        format!("{}{}", self.key_prefix, code_key)
    }

    /// 取得码点序列对应的 SVG 文本
    pub async fn get_emoji_svg(&self, query: &EmojiQuery, ctx: &ExecutionContext) -> Option<String> {
        if query.is_empty() {
            return None;
        }
        let code = query.code_key();
        let cache_key = self.cache_key(&code);
        if let Some(hit) = self.cache.lookup(&cache_key).await {
            return Some(hit.text());
        }

        for provider in self.providers.iter() {
            let url = provider.asset_url(&code);
            let resp = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!("emoji 提供方请求失败 {}: {}", url, e);
                    continue;
                }
            };
            if resp.status() != StatusCode::OK {
                tracing::debug!("emoji 提供方未命中 {}: {}", url, resp.status());
                continue;
            }
            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = match resp.bytes().await {
                Ok(b) => b,
                Err(e) => {
                    tracing::debug!("emoji 响应体读取失败 {}: {}", url, e);
                    continue;
                }
            };

            let cache = self.cache.clone();
            let entry = CacheEntry::new(body.clone()).with_content_type(content_type);
            ctx.wait_until(async move {
                cache.put(&cache_key, entry).await;
            });
            return Some(String::from_utf8_lossy(&body).into_owned());
        }

        tracing::warn!("所有 emoji 提供方均未返回 {}", code);
        None
    }

    /// 解析单个字素片段
    pub async fn load_emoji(&self, segment: &str, ctx: &ExecutionContext) -> Option<String> {
        self.get_emoji_svg(&EmojiQuery::from_segment(segment), ctx)
            .await
    }

    /// 渲染器资源钩子：只处理 emoji，失败时原样返回片段
    pub async fn load_additional_asset(
        &self,
        kind: &AssetKind,
        segment: &str,
        ctx: &ExecutionContext,
    ) -> AssetResolution {
        match kind {
            AssetKind::Emoji => match self.load_emoji(segment, ctx).await {
                Some(svg) => AssetResolution::Resolved(format!(
                    "data:image/svg+xml;base64,{}",
                    base64_engine.encode(svg)
                )),
                None => AssetResolution::Fallback(segment.to_string()),
            },
            AssetKind::Other(_) => AssetResolution::Unhandled,
        }
    }
}

/// 把解析器与当前请求的执行上下文绑定，作为渲染器的资源钩子
pub struct EmojiAssetHook<'a> {
    resolver: &'a EmojiResolver,
    ctx: &'a ExecutionContext,
}

impl<'a> EmojiAssetHook<'a> {
    pub fn new(resolver: &'a EmojiResolver, ctx: &'a ExecutionContext) -> Self {
        Self { resolver, ctx }
    }
}

impl AssetLoader for EmojiAssetHook<'_> {
    async fn load_additional_asset(&self, kind: &AssetKind, segment: &str) -> AssetResolution {
        self.resolver
            .load_additional_asset(kind, segment, self.ctx)
            .await
    }
}
