use std::future::Future;

/// 渲染器遇到无法直接绘制的片段时请求的资源类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Emoji,
    /// 其他类型（例如缺字时的语言代码），当前不处理
    Other(String),
}

/// 资源加载回调的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetResolution {
    /// 可内嵌的资源引用（data URI）
    Resolved(String),
    /// 无法解析，按原样作为文本渲染
    Fallback(String),
    /// 不处理该类型，什么也不渲染
    Unhandled,
}

/// 矢量渲染器的资源加载钩子
pub trait AssetLoader: Send + Sync {
    fn load_additional_asset(
        &self,
        kind: &AssetKind,
        segment: &str,
    ) -> impl Future<Output = AssetResolution> + Send;
}

/// 未配置 emoji 提供方时使用：所有片段都按文本渲染
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOnly;

impl AssetLoader for TextOnly {
    async fn load_additional_asset(&self, kind: &AssetKind, segment: &str) -> AssetResolution {
        match kind {
            AssetKind::Emoji => AssetResolution::Fallback(segment.to_string()),
            AssetKind::Other(_) => AssetResolution::Unhandled,
        }
    }
}
