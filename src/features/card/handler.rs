use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use reqwest::Url;

use crate::cache::{CacheEntry, CacheNamespace};
use crate::deferred::ExecutionContext;
use crate::error::AppError;
use crate::features::render::OutputFormat;
use crate::state::AppState;

use super::params::{CardParams, canonical_request_url};
use super::template::build_card_markup;

pub const CARD_CONTENT_TYPE: &str = OutputFormat::Png.content_type();
pub const CARD_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// `/`：渲染（或从缓存回放）OG 卡片，不区分请求方法
pub async fn render_card(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let url = canonical_request_url(&uri, &headers, &state.config.server.public_host)?;
    let ctx = state.deferred.context();
    serve_card(&state, &url, &ctx).await
}

/// 以完整请求 URL 为键的缓存优先渲染；未命中时渲染并延迟写入缓存
pub async fn serve_card(
    state: &AppState,
    url: &Url,
    ctx: &ExecutionContext,
) -> Result<Response, AppError> {
    let cache = state.cache.namespace(CacheNamespace::Response);
    let cache_key = url.as_str().to_string();
    if let Some(hit) = cache.lookup(&cache_key).await {
        tracing::debug!("响应缓存命中 {}", cache_key);
        return Ok(replay(&hit.headers, hit.body));
    }

    let params = CardParams::from_url(url);
    let image = state.source_images.normalize(params.image.as_deref()).await;
    let markup = build_card_markup(&params, image.as_ref());

    let started = Instant::now();
    let png = state
        .orchestrator
        .create_card(&markup, &state.render_options(), ctx)
        .await?;
    tracing::info!(
        "卡片渲染完成 {} bytes, {} ms",
        png.len(),
        started.elapsed().as_millis()
    );

    let headers = vec![
        (header::CONTENT_TYPE.to_string(), CARD_CONTENT_TYPE.to_string()),
        (header::CACHE_CONTROL.to_string(), CARD_CACHE_CONTROL.to_string()),
        (
            header::DATE.to_string(),
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        ),
    ];
    let entry = CacheEntry::new(png.clone())
        .with_content_type(Some(CARD_CONTENT_TYPE.to_string()))
        .with_headers(headers.clone());
    ctx.wait_until(async move {
        cache.put(&cache_key, entry).await;
    });

    Ok(replay(&headers, png))
}

/// 由头部列表与字节构造响应；非法头部被跳过
fn replay(headers: &[(String, String)], body: Bytes) -> Response {
    let mut resp = Response::new(Body::from(body));
    let map = resp.headers_mut();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                map.insert(n, v);
            }
            _ => tracing::warn!("跳过非法的缓存响应头 {}", name),
        }
    }
    resp
}

/// 除 `/` 以外的路径：404，空响应体
pub async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
