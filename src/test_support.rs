//! 单元测试共用的假上游服务与样例数据

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use image::{ImageFormat, Rgb, RgbImage};

/// 请求计数器
#[derive(Debug, Clone, Default)]
pub(crate) struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub(crate) fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// 在 127.0.0.1 随机端口启动假上游，返回 `http://127.0.0.1:port`
pub(crate) async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// 4x4 的纯色图片，按指定格式编码
pub(crate) fn encode_image(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(4, 4, Rgb([200, 40, 40]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format)
        .expect("encode sample image");
    out
}
