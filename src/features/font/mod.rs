mod resolver;

use axum::body::Bytes;

pub use resolver::{FontResolver, extract_font_url};

/// 字重（100..=900，步长 100）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    Thin,
    ExtraLight,
    Light,
    #[default]
    Regular,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

impl FontWeight {
    pub fn value(self) -> u16 {
        match self {
            FontWeight::Thin => 100,
            FontWeight::ExtraLight => 200,
            FontWeight::Light => 300,
            FontWeight::Regular => 400,
            FontWeight::Medium => 500,
            FontWeight::SemiBold => 600,
            FontWeight::Bold => 700,
            FontWeight::ExtraBold => 800,
            FontWeight::Black => 900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// 已解析的字体：字体族名 + 字体文件字节
#[derive(Debug, Clone, PartialEq)]
pub struct FontAsset {
    pub name: String,
    pub data: Bytes,
    pub weight: FontWeight,
    pub style: FontStyle,
    pub lang: Option<String>,
}

impl FontAsset {
    /// 单一静态字重：400 / normal
    pub fn regular(name: &str, data: Bytes) -> Self {
        Self {
            name: name.to_string(),
            data,
            weight: FontWeight::Regular,
            style: FontStyle::Normal,
            lang: None,
        }
    }
}
