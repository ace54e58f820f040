/// 统一错误处理模块
pub mod error;

/// 配置模块
pub mod config;

/// 路由组装
pub mod app;

/// 字体 / emoji / 响应缓存（内存 + SQLite）
pub mod cache;

/// 延迟写入任务
pub mod deferred;

/// 功能聚合模块
pub mod features;

/// 应用状态聚合模块
pub mod state;

/// 优雅退出管理模块
pub mod shutdown;

/// HTTP Client 复用工具
pub mod http;

#[cfg(test)]
mod test_support;

// 导出常用类型供外部使用
pub use app::build_router;
pub use config::AppConfig;
pub use error::AppError;
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::AppState;
