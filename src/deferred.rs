//! 延迟任务（fire-and-forget 的缓存写入）
//!
//! 缓存写入不应阻塞响应：解析器把写入交给 `ExecutionContext::wait_until`，
//! 任务立即在后台运行，响应照常返回。所有任务同时登记在进程级的 `TaskTracker` 中，
//! 优雅退出时由 `DeferredTasks::drain` 等待其全部完成后才结束进程。

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::error::AppError;

/// 进程级延迟任务集合
#[derive(Debug, Clone, Default)]
pub struct DeferredTasks {
    tracker: TaskTracker,
}

impl DeferredTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为单个请求创建执行上下文
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext {
            tracker: self.tracker.clone(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// 仍在运行的延迟任务数
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// 停止接收新批次并等待所有延迟任务完成
    pub async fn drain(&self, timeout: Duration) -> Result<(), AppError> {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!("等待 {} 个延迟写入任务完成", pending);
        }
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .map_err(|_| {
                AppError::Internal(format!(
                    "延迟任务在 {timeout:?} 内未完成，剩余 {}",
                    self.tracker.len()
                ))
            })
    }
}

/// 单个请求的执行上下文：持有本请求登记的延迟任务句柄
#[derive(Debug)]
pub struct ExecutionContext {
    tracker: TaskTracker,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ExecutionContext {
    /// 调度一个不阻塞调用方的后台任务
    pub fn wait_until<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.tracker.spawn(fut);
        if let Ok(mut handles) = self.handles.lock() {
            handles.push(handle);
        }
    }

    /// 本请求尚未完成的延迟任务数
    pub fn pending(&self) -> usize {
        self.handles
            .lock()
            .map(|h| h.iter().filter(|j| !j.is_finished()).count())
            .unwrap_or(0)
    }

    /// 等待本请求登记的所有延迟任务结束
    pub async fn settle(&self) {
        let handles = match self.handles.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("延迟任务异常结束: {}", e);
            }
        }
    }
}
