use std::sync::Arc;

use crate::cache::{CacheNamespace, CacheStore};
use crate::config::AppConfig;
use crate::deferred::DeferredTasks;
use crate::error::AppError;
use crate::features::emoji::EmojiResolver;
use crate::features::font::FontResolver;
use crate::features::render::{PngEncoder, RenderOptions, RenderOrchestrator};
use crate::features::source_image::SourceImageNormalizer;
use crate::http::build_client;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// 字体 / emoji / 响应三个命名空间共用的缓存
    pub cache: CacheStore,
    /// 进程级延迟写入任务，退出前需要排空
    pub deferred: DeferredTasks,
    pub source_images: SourceImageNormalizer,
    pub orchestrator: Arc<RenderOrchestrator>,
}

impl AppState {
    /// 按配置打开缓存并装配全部组件
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        let cache = CacheStore::open(&config.cache).await?;
        Self::with_cache(config, cache)
    }

    /// 使用已打开的缓存装配（持久层不可用时由调用方降级为纯内存）
    pub fn with_cache(config: AppConfig, cache: CacheStore) -> Result<Self, AppError> {
        let client = build_client(&config.http)?;

        let fonts = FontResolver::new(
            client.clone(),
            config.fonts.css_url.clone(),
            cache.namespace(CacheNamespace::Font),
        );
        let emoji = if config.emoji.providers.is_empty() {
            tracing::info!("未配置 emoji 提供方，emoji 将按文本渲染");
            None
        } else {
            Some(EmojiResolver::new(
                client.clone(),
                config.emoji.providers.clone(),
                cache.namespace(CacheNamespace::Emoji),
            ))
        };
        let orchestrator = RenderOrchestrator::new(
            fonts,
            emoji,
            PngEncoder::new(config.image.optimize_speed),
            config.image.effective_parallelism(),
        );

        Ok(Self {
            source_images: SourceImageNormalizer::new(client),
            orchestrator: Arc::new(orchestrator),
            deferred: DeferredTasks::new(),
            cache,
            config: Arc::new(config),
        })
    }

    /// 卡片渲染参数（固定尺寸与字体族列表）
    pub fn render_options(&self) -> RenderOptions {
        let card = &self.config.card;
        RenderOptions {
            width: card.width,
            height: card.height,
            scale: card.scale,
            fonts: self.config.fonts.families.clone(),
        }
    }
}
