use std::sync::{Arc, OnceLock};

use axum::body::Bytes;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, Options as UsvgOptions, fontdb};
use tokio::task::spawn_blocking;

use crate::error::AppError;

use super::svg::VectorImage;

/// 系统字体只扫描一次，每次渲染在其副本上追加已解析的 Web 字体
static SYSTEM_FONT_DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

fn system_font_db() -> Arc<fontdb::Database> {
    SYSTEM_FONT_DB
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            tracing::debug!("已加载系统字体 {} 个", db.len());
            Arc::new(db)
        })
        .clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
}

impl OutputFormat {
    pub const fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
        }
    }
}

/// 栅格化请求：目标尺寸可以与矢量文档尺寸不同，内容按比例缩放
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub image: VectorImage,
    pub width: u32,
    /// 缺省时按宽度等比推算
    pub height: Option<u32>,
    pub format: OutputFormat,
}

/// SVG → PNG 编码器
#[derive(Debug, Clone, Default)]
pub struct PngEncoder {
    optimize_speed: bool,
}

impl PngEncoder {
    pub fn new(optimize_speed: bool) -> Self {
        Self { optimize_speed }
    }

    /// 同步编码（CPU 密集）
    pub fn encode(&self, req: &EncodeRequest) -> Result<Bytes, AppError> {
        if req.width == 0 || req.height == Some(0) {
            return Err(AppError::ImageRendererError(format!(
                "非法的输出尺寸 {}x{:?}",
                req.width, req.height
            )));
        }
        let mut db = (*system_font_db()).clone();
        for font in &req.image.fonts {
            db.load_font_data(font.data.to_vec());
        }
        let speed = self.optimize_speed;
        let opts = UsvgOptions {
            fontdb: Arc::new(db),
            font_family: req
                .image
                .fonts
                .first()
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "sans-serif".to_string()),
            languages: vec!["ja".to_string(), "en".to_string()],
            shape_rendering: if speed {
                usvg::ShapeRendering::OptimizeSpeed
            } else {
                usvg::ShapeRendering::GeometricPrecision
            },
            text_rendering: if speed {
                usvg::TextRendering::OptimizeSpeed
            } else {
                usvg::TextRendering::OptimizeLegibility
            },
            image_rendering: if speed {
                usvg::ImageRendering::OptimizeSpeed
            } else {
                usvg::ImageRendering::OptimizeQuality
            },
            ..Default::default()
        };
        let tree = usvg::Tree::from_data(req.image.svg.as_bytes(), &opts)
            .map_err(|e| AppError::ImageRendererError(format!("Failed to parse SVG: {e}")))?;

        let src = tree.size();
        let sx = req.width as f32 / src.width();
        let dst_w = req.width;
        let dst_h = req
            .height
            .unwrap_or_else(|| (src.height() * sx).round().max(1.0) as u32);
        let sy = dst_h as f32 / src.height();

        let mut pixmap = Pixmap::new(dst_w, dst_h)
            .ok_or_else(|| AppError::ImageRendererError("Failed to create pixmap".to_string()))?;
        resvg::render(&tree, Transform::from_scale(sx, sy), &mut pixmap.as_mut());

        let out = match req.format {
            OutputFormat::Png => self.write_png(&pixmap, dst_w, dst_h)?,
        };
        Ok(Bytes::from(out))
    }

    /// tiny-skia 的像素是预乘 alpha，PNG 需要直通 alpha
    fn write_png(&self, pixmap: &Pixmap, w: u32, h: u32) -> Result<Vec<u8>, AppError> {
        let rgba: Vec<u8> = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        let mut out = Vec::with_capacity((w as usize) * (h as usize));
        {
            let mut encoder = png::Encoder::new(&mut out, w, h);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            if self.optimize_speed {
                encoder.set_compression(png::Compression::Fast);
                encoder.set_filter(png::FilterType::NoFilter);
            } else {
                encoder.set_compression(png::Compression::Default);
                encoder.set_filter(png::FilterType::Paeth);
            }
            let mut writer = encoder
                .write_header()
                .map_err(|e| AppError::ImageRendererError(format!("PNG write_header error: {e}")))?;
            writer.write_image_data(&rgba).map_err(|e| {
                AppError::ImageRendererError(format!("PNG write_image_data error: {e}"))
            })?;
            writer
                .finish()
                .map_err(|e| AppError::ImageRendererError(format!("PNG finish error: {e}")))?;
        }
        Ok(out)
    }

    /// 放入阻塞线程池执行，避免占用 tokio worker
    pub async fn encode_async(&self, req: EncodeRequest) -> Result<Bytes, AppError> {
        let encoder = self.clone();
        spawn_blocking(move || encoder.encode(&req))
            .await
            .map_err(|e| AppError::Internal(format!("阻塞渲染任务执行失败: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(svg_size: u32) -> VectorImage {
        VectorImage {
            svg: format!(
                r##"<svg xmlns="http://www.w3.org/2000/svg" width="{svg_size}" height="{}"><rect width="100%" height="100%" fill="#0044FF"/></svg>"##,
                svg_size / 2
            ),
            width: svg_size,
            height: svg_size / 2,
            fonts: Vec::new(),
        }
    }

    fn decoded_size(png: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(png).expect("decode png");
        (img.width(), img.height())
    }

    #[test]
    fn scales_to_requested_width() {
        let req = EncodeRequest {
            image: square(200),
            width: 100,
            height: None,
            format: OutputFormat::Png,
        };
        let png = PngEncoder::new(true).encode(&req).expect("encode");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(decoded_size(&png), (100, 50));
    }

    #[tokio::test]
    async fn explicit_height_is_respected() {
        let req = EncodeRequest {
            image: square(200),
            width: 140,
            height: Some(30),
            format: OutputFormat::Png,
        };
        let png = PngEncoder::new(false).encode_async(req).await.expect("encode");
        assert_eq!(decoded_size(&png), (140, 30));
    }

    #[test]
    fn translucent_pixels_keep_straight_color() {
        let vector = VectorImage {
            svg: r##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"><rect width="100%" height="100%" fill="#FF0000" fill-opacity="0.5"/></svg>"##
                .to_string(),
            width: 4,
            height: 4,
            fonts: Vec::new(),
        };
        let req = EncodeRequest {
            image: vector,
            width: 4,
            height: None,
            format: OutputFormat::Png,
        };
        let png = PngEncoder::default().encode(&req).expect("encode");
        let rgba = image::load_from_memory(&png).expect("decode png").to_rgba8();
        let px = rgba.get_pixel(1, 1);
        assert!(px[0] >= 250, "red channel was premultiplied: {:?}", px);
        assert_eq!((px[1], px[2]), (0, 0));
        assert!((120..=135).contains(&px[3]), "alpha {:?}", px);
    }

    #[test]
    fn invalid_svg_is_a_renderer_error() {
        let mut image = square(10);
        image.svg = "<not-svg".to_string();
        let req = EncodeRequest {
            image,
            width: 10,
            height: None,
            format: OutputFormat::Png,
        };
        let err = PngEncoder::default().encode(&req).unwrap_err();
        assert!(matches!(err, AppError::ImageRendererError(_)));
    }
}
