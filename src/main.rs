use ogp_card::cache::CacheStore;
use ogp_card::config::{AppConfig, CacheConfig};
use ogp_card::shutdown::drain_deferred_writes;
use ogp_card::{AppState, ShutdownManager, build_router};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "ogp_card={lvl},tower_http={lvl}",
            lvl = config.logging.level
        )
        .into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format.eq_ignore_ascii_case("compact") {
        builder.compact().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    // Load config（日志尚未初始化，失败直接输出到 stderr）
    let config = match AppConfig::init_global() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config init failed: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(config);

    // 创建优雅退出管理器并启动信号处理器
    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler().await {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // 持久缓存打不开时降级为纯内存缓存
    let state = match AppState::build(config.clone()).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("持久缓存不可用，降级为纯内存缓存: {}", e);
            let cache = CacheStore::in_memory(config.cache.memory_max_bytes);
            match AppState::with_cache(
                AppConfig {
                    cache: CacheConfig::memory_only(),
                    ..config.clone()
                },
                cache,
            ) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("应用状态初始化失败: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };
    let deferred = state.deferred.clone();
    let app = build_router(state);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!(
        "Card: http://{}/?name=Name&title=Title ({}x{:?} @ {})",
        addr,
        config.card.width,
        config.card.height,
        config.card.scale
    );

    // 运行服务器直到收到退出信号
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        let reason = shutdown_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    });

    if let Err(e) = graceful.await {
        tracing::error!("服务器运行错误: {}", e);
        std::process::exit(1);
    }

    // HTTP 服务已停止，等待延迟缓存写入完成
    if drain_deferred_writes(&deferred, config.shutdown.timeout_duration())
        .await
        .is_err()
    {
        tracing::warn!("优雅退出超时，部分缓存写入可能丢失");
    }

    tracing::info!("服务器已优雅关闭");
}
