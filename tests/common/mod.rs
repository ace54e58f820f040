#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use axum::{Router, extract::Path, routing::get as route_get};
use tower::ServiceExt;

use ogp_card::AppState;
use ogp_card::config::{AppConfig, CacheConfig, CardConfig, EmojiConfig, FontsConfig};
use ogp_card::features::emoji::EmojiProvider;

pub const PARTY_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><rect width="16" height="16" fill="#FFAA00"/></svg>"##;

/// 同时充当字体 CSS、字体文件与 emoji 提供方的假上游
pub async fn spawn_upstream() -> String {
    let router = Router::new()
        .route(
            "/css2",
            route_get(|headers: axum::http::HeaderMap| async move {
                let host = headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                format!("@font-face {{ src: url(http://{host}/files/test.ttf) format('truetype'); }}")
            }),
        )
        .route("/files/:name", route_get(|| async { b"not really a font".to_vec() }))
        .route(
            "/emoji/:file",
            route_get(|Path(file): Path<String>| async move {
                if file == "1F389.svg" {
                    (StatusCode::OK, PARTY_SVG)
                } else {
                    (StatusCode::NOT_FOUND, "")
                }
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// 小尺寸卡片 + 纯内存缓存，全部上游指向假服务
pub fn test_config(upstream: &str) -> AppConfig {
    AppConfig {
        fonts: FontsConfig {
            css_url: format!("{upstream}/css2"),
            families: vec!["Test Sans".to_string()],
        },
        emoji: EmojiConfig {
            providers: vec![EmojiProvider::new(format!("{upstream}/emoji/"))],
        },
        cache: CacheConfig::memory_only(),
        card: CardConfig {
            width: 300,
            height: Some(160),
            scale: 0.5,
        },
        ..AppConfig::default()
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri).await
}

pub async fn send(app: &Router, method: Method, uri: &str) -> Response<Body> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "ogp.test")
        .body(Body::empty())
        .expect("build request");
    app.clone().oneshot(req).await.expect("call app")
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}

/// 等待所有延迟缓存写入完成
pub async fn wait_for_deferred(state: &AppState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.deferred.pending() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("deferred writes did not finish");
}
