use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use tokio::sync::Semaphore;

use crate::deferred::ExecutionContext;
use crate::error::AppError;
use crate::features::emoji::{EmojiAssetHook, EmojiResolver};
use crate::features::font::FontResolver;

use super::asset::TextOnly;
use super::markup::CardMarkup;
use super::raster::{EncodeRequest, OutputFormat, PngEncoder};
use super::svg::{SvgCardRenderer, VectorOptions};

/// 单次渲染参数
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// 布局宽度
    pub width: u32,
    pub height: Option<u32>,
    /// 输出像素 = 布局尺寸 × scale
    pub scale: f32,
    /// 需要解析的 Web 字体族，顺序即回退顺序
    pub fonts: Vec<String>,
}

/// 渲染编排：字体解析 → 矢量渲染（emoji 钩子）→ 栅格化编码
pub struct RenderOrchestrator {
    fonts: FontResolver,
    emoji: Option<EmojiResolver>,
    renderer: SvgCardRenderer,
    encoder: PngEncoder,
    permits: Arc<Semaphore>,
    renders: AtomicU64,
}

impl RenderOrchestrator {
    pub fn new(
        fonts: FontResolver,
        emoji: Option<EmojiResolver>,
        encoder: PngEncoder,
        parallelism: usize,
    ) -> Self {
        Self {
            fonts,
            emoji,
            renderer: SvgCardRenderer::new(),
            encoder,
            permits: Arc::new(Semaphore::new(parallelism.max(1))),
            renders: AtomicU64::new(0),
        }
    }

    /// 已完成的栅格化次数
    pub fn renders_completed(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    pub async fn create_card(
        &self,
        markup: &CardMarkup,
        opts: &RenderOptions,
        ctx: &ExecutionContext,
    ) -> Result<Bytes, AppError> {
        if !opts.scale.is_finite() || opts.scale <= 0.0 {
            return Err(AppError::ImageRendererError(format!(
                "非法的缩放比例 {}",
                opts.scale
            )));
        }

        let fonts = self.fonts.resolve(&opts.fonts, ctx).await;
        if fonts.len() < opts.fonts.len() {
            tracing::debug!("字体解析 {}/{} 成功", fonts.len(), opts.fonts.len());
        }
        let vector_opts = VectorOptions {
            width: opts.width,
            height: opts.height,
            fonts,
        };
        let image = match &self.emoji {
            Some(resolver) => {
                let hook = EmojiAssetHook::new(resolver, ctx);
                self.renderer.render(markup, &vector_opts, &hook).await?
            }
            None => self.renderer.render(markup, &vector_opts, &TextOnly).await?,
        };

        let req = EncodeRequest {
            width: scaled(image.width, opts.scale),
            height: Some(scaled(image.height, opts.scale)),
            image,
            format: OutputFormat::Png,
        };
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AppError::Internal(format!("渲染许可获取失败: {e}")))?;
        let png = self.encoder.encode_async(req).await?;
        self.renders.fetch_add(1, Ordering::Relaxed);
        Ok(png)
    }
}

fn scaled(v: u32, scale: f32) -> u32 {
    (v as f32 * scale).round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheNamespace, CacheStore};
    use crate::deferred::DeferredTasks;
    use crate::features::emoji::EmojiProvider;
    use crate::features::render::markup::{Frame, Insets, TextAlign, TextBlock};
    use crate::test_support::{HitCounter, spawn_upstream};
    use axum::{Router, routing::get};

    fn markup(title: &str) -> CardMarkup {
        let text = |t: &str, size: f32| TextBlock {
            text: t.to_string(),
            font_size: size,
            line_height: size,
            max_lines: Some(2),
            color: "#000000".to_string(),
            align: TextAlign::Start,
            padding: Insets::default(),
        };
        CardMarkup {
            padding: Insets::symmetric(4.0, 4.0),
            frame: Frame {
                border_width: 2.0,
                border_color: "#0044FF".to_string(),
                radius: 4.0,
                gradient: ("#ffffff".to_string(), "#d3eef9".to_string()),
            },
            image: None,
            title: text(title, 24.0),
            name: text("Name", 16.0),
        }
    }

    fn orchestrator(store: &CacheStore, emoji: Option<EmojiResolver>) -> RenderOrchestrator {
        let fonts = FontResolver::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/css2",
            store.namespace(CacheNamespace::Font),
        );
        RenderOrchestrator::new(fonts, emoji, PngEncoder::new(true), 2)
    }

    fn options() -> RenderOptions {
        RenderOptions {
            width: 200,
            height: Some(100),
            scale: 0.7,
            fonts: vec!["Noto Sans".to_string()],
        }
    }

    #[tokio::test]
    async fn output_is_scaled_png_even_without_fonts() {
        let store = CacheStore::in_memory(1024 * 1024);
        let orch = orchestrator(&store, None);
        let ctx = DeferredTasks::new().context();
        let png = orch
            .create_card(&markup("Hello"), &options(), &ctx)
            .await
            .expect("render");
        let img = image::load_from_memory(&png).expect("decode");
        assert_eq!((img.width(), img.height()), (140, 70));
        assert_eq!(orch.renders_completed(), 1);
    }

    #[tokio::test]
    async fn emoji_are_fetched_once_and_cached() {
        let hits = HitCounter::default();
        let counter = hits.clone();
        let router = Router::new().route(
            "/:file",
            get(move || {
                counter.hit();
                async {
                    r#"<svg xmlns="http://www.w3.org/2000/svg" width="8" height="8"><circle cx="4" cy="4" r="4"/></svg>"#
                }
            }),
        );
        let base = spawn_upstream(router).await;
        let store = CacheStore::in_memory(1024 * 1024);
        let emoji = EmojiResolver::new(
            reqwest::Client::new(),
            vec![EmojiProvider::new(format!("{base}/"))],
            store.namespace(CacheNamespace::Emoji),
        );
        let orch = orchestrator(&store, Some(emoji));
        let tasks = DeferredTasks::new();

        let ctx = tasks.context();
        orch.create_card(&markup("🎉🎉"), &options(), &ctx)
            .await
            .expect("first render");
        ctx.settle().await;
        assert_eq!(hits.count(), 1);

        orch.create_card(&markup("🎉"), &options(), &tasks.context())
            .await
            .expect("second render");
        assert_eq!(hits.count(), 1);
        assert_eq!(orch.renders_completed(), 2);
    }

    #[tokio::test]
    async fn non_positive_scale_is_rejected() {
        let store = CacheStore::in_memory(1024);
        let orch = orchestrator(&store, None);
        let opts = RenderOptions {
            scale: 0.0,
            ..options()
        };
        let err = orch
            .create_card(&markup("x"), &opts, &DeferredTasks::new().context())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ImageRendererError(_)));
        assert_eq!(orch.renders_completed(), 0);
    }
}
