//! 卡片标记树 → SVG 文档
//!
//! 文字按字素簇切分，宽度用 unicode 显示宽度估算（与实际字形宽度有偏差，
//! 但足以完成换行与省略号截断）。emoji 字素交给资源钩子，按返回结果
//! 内嵌图片、回退为文字或直接跳过。

use std::collections::HashMap;
use std::fmt::Write as _;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::error::AppError;
use crate::features::font::FontAsset;

use super::asset::{AssetKind, AssetLoader, AssetResolution};
use super::markup::{CardMarkup, TextAlign, TextBlock};

/// 半角字符宽度 / 字号
const HALF_WIDTH_RATIO: f32 = 0.56;
const ELLIPSIS: &str = "…";
const GRADIENT_ID: &str = "card-bg";
const IMAGE_CLIP_ID: &str = "card-image-clip";

#[derive(Debug, Clone, PartialEq)]
pub struct VectorOptions {
    pub width: u32,
    /// 缺省时取标记树的自然高度
    pub height: Option<u32>,
    pub fonts: Vec<FontAsset>,
}

/// 矢量渲染结果；字体随文档一起交给栅格化阶段
#[derive(Debug, Clone)]
pub struct VectorImage {
    pub svg: String,
    pub width: u32,
    pub height: u32,
    pub fonts: Vec<FontAsset>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SvgCardRenderer;

impl SvgCardRenderer {
    pub fn new() -> Self {
        Self
    }

    pub async fn render<L: AssetLoader>(
        &self,
        markup: &CardMarkup,
        opts: &VectorOptions,
        loader: &L,
    ) -> Result<VectorImage, AppError> {
        if opts.width == 0 {
            return Err(AppError::ImageRendererError("卡片宽度不能为 0".to_string()));
        }
        let height = match opts.height {
            Some(0) => {
                return Err(AppError::ImageRendererError("卡片高度不能为 0".to_string()));
            }
            Some(h) => h,
            None => markup.natural_height().ceil().max(1.0) as u32,
        };
        let (w, h) = (opts.width as f32, height as f32);
        let family = font_family_attr(&opts.fonts);
        let mut memo = AssetMemo::default();

        let mut svg = String::with_capacity(4096);
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
        );

        let frame = &markup.frame;
        let bw = frame.border_width;
        let fx = markup.padding.left;
        let fy = markup.padding.top;
        let fw = (w - markup.padding.horizontal()).max(0.0);
        let fh = (h - markup.padding.vertical()).max(0.0);
        // 内容区（边框以内）
        let cx = fx + bw;
        let cy = fy + bw;
        let cw = (fw - bw * 2.0).max(0.0);
        let ch = (fh - bw * 2.0).max(0.0);

        svg.push_str("<defs>");
        let _ = write!(
            svg,
            r#"<linearGradient id="{GRADIENT_ID}" x1="0" y1="0" x2="1" y2="1"><stop offset="0" stop-color="{}"/><stop offset="1" stop-color="{}"/></linearGradient>"#,
            escape_xml(&frame.gradient.0),
            escape_xml(&frame.gradient.1)
        );
        if let Some(image) = &markup.image {
            let r = (image.size / 2.0 - image.padding).max(0.0);
            let _ = write!(
                svg,
                r#"<clipPath id="{IMAGE_CLIP_ID}"><circle cx="{:.1}" cy="{:.1}" r="{r:.1}"/></clipPath>"#,
                cx + image.size / 2.0,
                cy + image.size / 2.0
            );
        }
        svg.push_str("</defs>");

        let _ = write!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="{:.1}" fill="url(#{GRADIENT_ID})" stroke="{}" stroke-width="{bw:.1}"/>"#,
            fx + bw / 2.0,
            fy + bw / 2.0,
            (fw - bw).max(0.0),
            (fh - bw).max(0.0),
            (frame.radius - bw / 2.0).max(0.0),
            escape_xml(&frame.border_color)
        );

        if let Some(image) = &markup.image {
            let inner = (image.size - image.padding * 2.0).max(0.0);
            let _ = write!(
                svg,
                r#"<image xlink:href="{}" x="{:.1}" y="{:.1}" width="{inner:.1}" height="{inner:.1}" opacity="{}" clip-path="url(#{IMAGE_CLIP_ID})" preserveAspectRatio="xMidYMid slice"/>"#,
                escape_xml(&image.href),
                cx + image.padding,
                cy + image.padding,
                image.opacity
            );
        }

        // 署名贴底，标题占据剩余空间
        let name_h = markup.name.line_height + markup.name.padding.vertical();
        let name_area = Area {
            x: cx,
            y: cy + ch - name_h,
            w: cw,
        };
        let title_area = Area { x: cx, y: cy, w: cw };

        draw_text(&mut svg, &markup.title, title_area, &family, &mut memo, loader).await;
        draw_text(&mut svg, &markup.name, name_area, &family, &mut memo, loader).await;

        svg.push_str("</svg>");

        Ok(VectorImage {
            svg,
            width: opts.width,
            height,
            fonts: opts.fonts.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Area {
    x: f32,
    y: f32,
    w: f32,
}

/// 单次渲染内的钩子结果缓存，同一字素只询问一次
#[derive(Default)]
struct AssetMemo {
    resolved: HashMap<String, AssetResolution>,
}

impl AssetMemo {
    async fn emoji<L: AssetLoader>(&mut self, loader: &L, segment: &str) -> AssetResolution {
        if let Some(hit) = self.resolved.get(segment) {
            return hit.clone();
        }
        let res = loader
            .load_additional_asset(&AssetKind::Emoji, segment)
            .await;
        self.resolved.insert(segment.to_string(), res.clone());
        res
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Glyph<'a> {
    text: &'a str,
    emoji: bool,
    advance: f32,
}

impl<'a> Glyph<'a> {
    fn measure(text: &'a str, font_size: f32) -> Self {
        let emoji = is_emoji_grapheme(text);
        let advance = if emoji {
            font_size
        } else {
            match UnicodeWidthStr::width(text) {
                0 => 0.0,
                1 => font_size * HALF_WIDTH_RATIO,
                _ => font_size,
            }
        };
        Self {
            text,
            emoji,
            advance,
        }
    }
}

fn line_width(line: &[Glyph<'_>]) -> f32 {
    line.iter().map(|g| g.advance).sum()
}

/// 逐字素换行（任意位置可断行），超出行数时末行以省略号结尾
fn layout_lines(
    text: &str,
    font_size: f32,
    max_width: f32,
    max_lines: Option<usize>,
) -> Vec<Vec<Glyph<'_>>> {
    let mut lines: Vec<Vec<Glyph<'_>>> = vec![Vec::new()];
    let mut current = 0.0f32;
    for g in text.graphemes(true) {
        if g == "\n" || g == "\r\n" {
            lines.push(Vec::new());
            current = 0.0;
            continue;
        }
        let glyph = Glyph::measure(g, font_size);
        let line_is_empty = lines.last().is_none_or(|l| l.is_empty());
        if current + glyph.advance > max_width && !line_is_empty {
            lines.push(Vec::new());
            current = 0.0;
            if g.trim().is_empty() {
                continue;
            }
        }
        current += glyph.advance;
        if let Some(line) = lines.last_mut() {
            line.push(glyph);
        }
    }

    let overflow = max_lines.filter(|m| *m > 0 && lines.len() > *m);
    if let Some(max) = overflow {
        lines.truncate(max);
        let ellipsis = Glyph::measure(ELLIPSIS, font_size);
        if let Some(last) = lines.last_mut() {
            while !last.is_empty() && line_width(last) + ellipsis.advance > max_width {
                last.pop();
            }
            last.push(ellipsis);
        }
    }
    lines
}

async fn draw_text<L: AssetLoader>(
    out: &mut String,
    block: &TextBlock,
    area: Area,
    family: &str,
    memo: &mut AssetMemo,
    loader: &L,
) {
    let inner_x = area.x + block.padding.left;
    let inner_w = (area.w - block.padding.horizontal()).max(block.font_size);
    let lines = layout_lines(&block.text, block.font_size, inner_w, block.max_lines);

    let mut run = TextRun {
        family,
        block,
        x: 0.0,
        y: 0.0,
        text: String::new(),
    };
    for (i, line) in lines.iter().enumerate() {
        let line_top = area.y + block.padding.top + block.line_height * i as f32;
        let baseline = line_top + block.line_height / 2.0 + block.font_size * 0.35;
        let mut x = match block.align {
            TextAlign::Start => inner_x,
            TextAlign::End => inner_x + inner_w - line_width(line),
        };
        run.start(x, baseline);

        for glyph in line {
            if glyph.emoji {
                match memo.emoji(loader, glyph.text).await {
                    AssetResolution::Resolved(uri) => {
                        run.flush(out);
                        let size = block.font_size;
                        let _ = write!(
                            out,
                            r#"<image xlink:href="{}" x="{x:.1}" y="{:.1}" width="{size:.1}" height="{size:.1}"/>"#,
                            escape_xml(&uri),
                            baseline - size * 0.85
                        );
                        x += glyph.advance;
                        run.start(x, baseline);
                        continue;
                    }
                    AssetResolution::Fallback(text) => run.text.push_str(&text),
                    AssetResolution::Unhandled => {
                        run.flush(out);
                        x += glyph.advance;
                        run.start(x, baseline);
                        continue;
                    }
                }
            } else {
                run.text.push_str(glyph.text);
            }
            x += glyph.advance;
        }
        run.flush(out);
    }
}

/// 同一行内连续的文字片段，合并为一个 `<text>` 元素
struct TextRun<'a> {
    family: &'a str,
    block: &'a TextBlock,
    x: f32,
    y: f32,
    text: String,
}

impl TextRun<'_> {
    fn start(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.text.clear();
    }

    fn flush(&mut self, out: &mut String) {
        if self.text.is_empty() {
            return;
        }
        let _ = write!(
            out,
            r#"<text x="{:.1}" y="{:.1}" font-family="{}" font-size="{}" fill="{}" xml:space="preserve">{}</text>"#,
            self.x,
            self.y,
            self.family,
            self.block.font_size,
            escape_xml(&self.block.color),
            escape_xml(&self.text)
        );
        self.text.clear();
    }
}

/// 按已解析字体的顺序构造 font-family 回退链
fn font_family_attr(fonts: &[FontAsset]) -> String {
    let mut names: Vec<String> = Vec::with_capacity(fonts.len() + 1);
    for f in fonts {
        let quoted = format!("'{}'", f.name.replace('\'', ""));
        if !names.contains(&quoted) {
            names.push(quoted);
        }
    }
    names.push("sans-serif".to_string());
    escape_xml(&names.join(", "))
}

/// 需要作为 emoji 图片绘制的字素簇
pub(crate) fn is_emoji_grapheme(g: &str) -> bool {
    g.chars().any(|c| {
        matches!(
            c as u32,
            0xFE0F | 0x20E3 | 0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0x231A..=0x23FF
        )
    })
}

/// 转义 XML 特殊字符，并丢弃 XML 1.0 不允许出现的字符（C0 控制符、U+FFFE/U+FFFF）
fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}
