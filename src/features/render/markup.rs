/// 四边留白
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Insets {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Insets {
    pub const fn symmetric(vertical: f32, horizontal: f32) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    pub const fn new(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }
}

/// 带边框与渐变背景的外框
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub border_width: f32,
    pub border_color: String,
    pub radius: f32,
    /// 左上 → 右下的线性渐变
    pub gradient: (String, String),
}

/// 圆形裁剪的背景图
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    /// 可内嵌的图片引用（data URI）
    pub href: String,
    pub size: f32,
    pub padding: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Start,
    End,
}

/// 一段可换行的文字
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub font_size: f32,
    pub line_height: f32,
    /// 超出行数时以省略号截断
    pub max_lines: Option<usize>,
    pub color: String,
    pub align: TextAlign,
    pub padding: Insets,
}

/// 卡片的标记树：外框内上方为标题区（可叠加背景图），底部为署名
#[derive(Debug, Clone, PartialEq)]
pub struct CardMarkup {
    pub padding: Insets,
    pub frame: Frame,
    pub image: Option<ImageBlock>,
    pub title: TextBlock,
    pub name: TextBlock,
}

impl CardMarkup {
    /// 未指定高度时的自然高度
    pub fn natural_height(&self) -> f32 {
        let title_lines = self.title.max_lines.unwrap_or(1).max(1) as f32;
        self.padding.vertical()
            + self.frame.border_width * 2.0
            + self.title.padding.vertical()
            + self.title.line_height * title_lines
            + self.name.padding.vertical()
            + self.name.line_height
    }
}
