use std::fmt::Write;

const ZERO_WIDTH_JOINER: u32 = 0x200D;
const VARIATION_SELECTOR_16: u32 = 0xFE0F;

/// 单个字素片段的码点序列（已规范化）
///
/// 不含 ZWJ 时去掉 U+FE0F，使限定/非限定写法映射到同一个提供方文件名；
/// 含 ZWJ 的组合序列保留全部码点。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiQuery {
    code_points: Vec<u32>,
}

impl EmojiQuery {
    pub fn from_segment(segment: &str) -> Self {
        let codes: Vec<u32> = segment.chars().map(u32::from).collect();
        let joined = codes.contains(&ZERO_WIDTH_JOINER);
        Self {
            code_points: codes
                .into_iter()
                .filter(|&c| joined || c != VARIATION_SELECTOR_16)
                .collect(),
        }
    }

    pub fn code_points(&self) -> &[u32] {
        &self.code_points
    }

    pub fn is_empty(&self) -> bool {
        self.code_points.is_empty()
    }

    /// 小写十六进制、不补零、以 `-` 连接
    pub fn code_key(&self) -> String {
        let mut key = String::with_capacity(self.code_points.len() * 6);
        for (i, cp) in self.code_points.iter().enumerate() {
            if i > 0 {
                key.push('-');
            }
            let _ = write!(key, "{cp:x}");
        }
        key
    }
}
