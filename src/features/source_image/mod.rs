//! 用户提供的图片地址 → 可直接内嵌的图片
//!
//! PNG/JPEG 原样透传；其他 `image/*` 类型解码后重新编码为 PNG。
//! 任何失败都只返回 `None`，模板随之省略图片元素。

use std::io::Cursor;

use axum::body::Bytes;
use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use image::ImageFormat;
use reqwest::{Client, Url, header};
use tokio::task::spawn_blocking;

/// 可被 SVG 直接内嵌的栅格格式
const EMBEDDABLE_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

/// 规范化后的源图片（不单独缓存，只随最终渲染结果一起缓存）
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub content_type: String,
    pub bytes: Bytes,
}

impl SourceImage {
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64_engine.encode(&self.bytes)
        )
    }
}

#[derive(Clone)]
pub struct SourceImageNormalizer {
    client: Client,
}

impl SourceImageNormalizer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn normalize(&self, url: Option<&str>) -> Option<SourceImage> {
        let raw = url.map(str::trim).filter(|s| !s.is_empty())?;
        let url = match Url::parse(raw) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!("图片地址无法解析 '{}': {}", raw, e);
                return None;
            }
        };

        let resp = match self.client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("源图片请求失败 {}: {}", url, e);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!("源图片返回 {} {}", resp.status(), url);
            return None;
        }
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| v.starts_with("image/"));
        let Some(content_type) = content_type else {
            tracing::warn!("源图片不是 image/* 类型: {}", url);
            return None;
        };
        let bytes = resp.bytes().await.ok()?;

        if EMBEDDABLE_TYPES.contains(&content_type.as_str()) {
            return Some(SourceImage {
                content_type,
                bytes,
            });
        }

        let png = reencode_png(bytes).await?;
        tracing::debug!("源图片 {} 已从 {} 转为 PNG", url, content_type);
        Some(SourceImage {
            content_type: "image/png".to_string(),
            bytes: png,
        })
    }
}

/// 解码任意受支持格式并编码为 PNG（CPU 密集，移出 tokio worker）
async fn reencode_png(bytes: Bytes) -> Option<Bytes> {
    let result = spawn_blocking(move || -> Result<Vec<u8>, image::ImageError> {
        let img = image::load_from_memory(&bytes)?;
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    })
    .await;

    match result {
        Ok(Ok(out)) if !out.is_empty() => Some(Bytes::from(out)),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            tracing::warn!("源图片转码失败: {}", e);
            None
        }
        Err(e) => {
            tracing::warn!("源图片转码任务执行失败: {}", e);
            None
        }
    }
}
