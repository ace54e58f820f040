use reqwest::Client;

use crate::config::HttpConfig;
use crate::error::AppError;

/// 构建全局复用的 HTTP Client（统一连接池/Keep-Alive），由 `AppState` 持有并注入各解析器。
///
/// 说明：
/// - 字体/emoji/源图片都是“尽力而为”的辅助请求，默认不设置 timeout；
/// - 默认不发送 User-Agent：字体 CSS 端点会据此返回 truetype 而不是 woff2。
pub fn build_client(cfg: &HttpConfig) -> Result<Client, AppError> {
    let mut builder = Client::builder();
    if let Some(timeout) = cfg.timeout() {
        builder = builder.timeout(timeout);
    }
    if let Some(ua) = cfg.user_agent.as_deref().filter(|s| !s.is_empty()) {
        builder = builder.user_agent(ua);
    }
    builder
        .build()
        .map_err(|e| AppError::Internal(format!("HTTP client 初始化失败: {e}")))
}
