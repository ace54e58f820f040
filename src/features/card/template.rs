use crate::features::render::{CardMarkup, Frame, ImageBlock, Insets, TextAlign, TextBlock};
use crate::features::source_image::SourceImage;

use super::params::CardParams;

/// 固定的卡片版式：蓝色圆角边框、白 → 浅蓝渐变，标题最多四行，署名右下角
pub fn build_card_markup(params: &CardParams, image: Option<&SourceImage>) -> CardMarkup {
    CardMarkup {
        padding: Insets::symmetric(16.0, 24.0),
        frame: Frame {
            border_width: 16.0,
            border_color: "#0044FF".to_string(),
            radius: 24.0,
            gradient: ("#ffffff".to_string(), "#d3eef9".to_string()),
        },
        image: image.map(|img| ImageBlock {
            href: img.data_uri(),
            size: 480.0,
            padding: 8.0,
            opacity: 0.4,
        }),
        title: TextBlock {
            text: params.title.clone(),
            font_size: 72.0,
            line_height: 64.0,
            max_lines: Some(4),
            color: "#000000".to_string(),
            align: TextAlign::Start,
            padding: Insets::symmetric(0.0, 42.0),
        },
        name: TextBlock {
            text: params.name.clone(),
            font_size: 48.0,
            line_height: 48.0,
            max_lines: Some(1),
            color: "#CC3344".to_string(),
            align: TextAlign::End,
            padding: Insets::new(0.0, 32.0, 32.0, 0.0),
        },
    }
}
