use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::features::emoji::EmojiProvider;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// 请求缺少 Host 头时用于拼接缓存键的主机名
    #[serde(default = "ServerConfig::default_public_host")]
    pub public_host: String,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8787
    }

    fn default_public_host() -> String {
        "localhost".to_string()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            public_host: Self::default_public_host(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 未设置时生效）
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// 日志格式：full | compact
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    fn default_format() -> String {
        "full".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
        }
    }
}

/// 上游请求配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HttpConfig {
    /// 单次请求超时（秒），0 表示不设置，由上游自行决定
    #[serde(default)]
    pub timeout_secs: u64,
    /// 自定义 User-Agent；留空时不发送，字体 CSS 才会返回 truetype 链接
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// 缓存配置（内存层 + 可选 SQLite 持久层）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 内存层最大容量（字节），按条目 body 大小加权
    #[serde(default = "CacheConfig::default_memory_max_bytes")]
    pub memory_max_bytes: u64,
    /// 是否启用 SQLite 持久层
    #[serde(default = "CacheConfig::default_persistent")]
    pub persistent: bool,
    /// SQLite 文件路径
    #[serde(default = "CacheConfig::default_sqlite_path")]
    pub sqlite_path: String,
    /// 是否启用 WAL
    #[serde(default = "CacheConfig::default_sqlite_wal")]
    pub sqlite_wal: bool,
}

impl CacheConfig {
    fn default_memory_max_bytes() -> u64 {
        128 * 1024 * 1024
    }
    fn default_persistent() -> bool {
        true
    }
    fn default_sqlite_path() -> String {
        "./resources/ogp_cache.db".to_string()
    }
    fn default_sqlite_wal() -> bool {
        true
    }

    /// 仅内存层，主要用于测试
    pub fn memory_only() -> Self {
        Self {
            persistent: false,
            ..Self::default()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_bytes: Self::default_memory_max_bytes(),
            persistent: Self::default_persistent(),
            sqlite_path: Self::default_sqlite_path(),
            sqlite_wal: Self::default_sqlite_wal(),
        }
    }
}

/// Web 字体配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsConfig {
    /// 字体 CSS 端点（`?family=` 会被追加）
    #[serde(default = "FontsConfig::default_css_url")]
    pub css_url: String,
    /// 渲染时请求的字体族（顺序即回退顺序）
    #[serde(default = "FontsConfig::default_families")]
    pub families: Vec<String>,
}

impl FontsConfig {
    fn default_css_url() -> String {
        "https://fonts.googleapis.com/css2".to_string()
    }
    fn default_families() -> Vec<String> {
        ["Noto Sans", "Noto Sans Math", "Noto Sans Symbols", "Noto Sans JP"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            css_url: Self::default_css_url(),
            families: Self::default_families(),
        }
    }
}

/// Emoji 提供方配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiConfig {
    /// 按声明顺序尝试的提供方；为空时不挂载 emoji 回调
    #[serde(default = "EmojiConfig::default_providers")]
    pub providers: Vec<EmojiProvider>,
}

impl EmojiConfig {
    fn default_providers() -> Vec<EmojiProvider> {
        vec![
            EmojiProvider::new(
                "https://cdn.jsdelivr.net/gh/svgmoji/svgmoji/packages/svgmoji__noto/svg/",
            ),
            EmojiProvider::new("https://openmoji.org/data/color/svg/"),
        ]
    }
}

impl Default for EmojiConfig {
    fn default() -> Self {
        Self {
            providers: Self::default_providers(),
        }
    }
}

/// 卡片尺寸配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardConfig {
    #[serde(default = "CardConfig::default_width")]
    pub width: u32,
    /// 为空时按 SVG 宽高比推算
    #[serde(default = "CardConfig::default_height")]
    pub height: Option<u32>,
    /// 输出分辨率倍率（宽高同乘）
    #[serde(default = "CardConfig::default_scale")]
    pub scale: f32,
}

impl CardConfig {
    fn default_width() -> u32 {
        1200
    }
    fn default_height() -> Option<u32> {
        Some(630)
    }
    fn default_scale() -> f32 {
        0.7
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            scale: Self::default_scale(),
        }
    }
}

/// 图片渲染配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageRenderConfig {
    /// 是否优先速度渲染（OptimizeSpeed），提升栅格化性能，可能略降画质
    #[serde(default)]
    pub optimize_speed: bool,
    /// 并发渲染许可数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_parallel: u32,
}

impl ImageRenderConfig {
    pub fn effective_parallelism(&self) -> usize {
        match self.max_parallel {
            0 => num_cpus::get(),
            m => m as usize,
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 等待延迟写入完成的超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fonts: FontsConfig,
    #[serde(default)]
    pub emoji: EmojiConfig,
    #[serde(default)]
    pub card: CardConfig,
    #[serde(default)]
    pub image: ImageRenderConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖（例如 `APP_CACHE__SQLITE_PATH`）
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<&'static AppConfig, ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(Self::global())
    }

    /// 配置文件路径，`APP_CONFIG` 可覆盖
    fn get_config_path() -> PathBuf {
        std::env::var_os("APP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn defaults_match_card_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.card.width, 1200);
        assert_eq!(cfg.card.height, Some(630));
        assert_eq!(cfg.fonts.families.first().map(String::as_str), Some("Noto Sans"));
        assert_eq!(cfg.emoji.providers.len(), 2);
        assert!(cfg.http.timeout().is_none());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[card]\nscale = 1.0\n[cache]\npersistent = false\n",
                config::FileFormat::Toml,
            ))
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("deserialize config");
        assert_eq!(cfg.card.scale, 1.0);
        assert_eq!(cfg.card.width, 1200);
        assert!(!cfg.cache.persistent);
        assert_eq!(cfg.server.port, 8787);
    }

    #[test]
    fn partial_sections_keep_field_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[server]\npublic_host = \"ogp.example\"\n[logging]\nformat = \"compact\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("deserialize config");
        assert_eq!(cfg.server.public_host, "ogp.example");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8787);
        assert_eq!(cfg.logging.format, "compact");
        assert_eq!(cfg.logging.level, "info");
    }
}
