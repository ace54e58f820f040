mod query;
mod resolver;

use serde::{Deserialize, Serialize};

pub use query::EmojiQuery;
pub use resolver::{EmojiAssetHook, EmojiResolver};

/// emoji SVG 提供方：候选地址为 `url + 十六进制码点序列 + ".svg"`
///
/// `upper` 缺省或为 `true` 时码点使用大写，只有显式 `false` 才使用小写。
/// 序列化时省略缺省的 `upper`，序列化结果参与缓存键的构造。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiProvider {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<bool>,
}

impl EmojiProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            upper: None,
        }
    }

    pub fn lowercase(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            upper: Some(false),
        }
    }

    /// 根据码点序列构造候选 SVG 地址
    pub fn asset_url(&self, code_key: &str) -> String {
        let code = if self.upper == Some(false) {
            code_key.to_lowercase()
        } else {
            code_key.to_uppercase()
        };
        format!("{}{}.svg", self.url, code)
    }
}

#[cfg(test)]
mod tests {
    use super::EmojiProvider;

    #[test]
    fn asset_url_follows_case_convention() {
        assert_eq!(
            EmojiProvider::new("https://a/").asset_url("1f600"),
            "https://a/1F600.svg"
        );
        assert_eq!(
            EmojiProvider::lowercase("https://b/").asset_url("1F600-200D"),
            "https://b/1f600-200d.svg"
        );
    }

    #[test]
    fn serialization_omits_absent_upper() {
        let json = serde_json::to_string(&vec![
            EmojiProvider::new("https://a/"),
            EmojiProvider::lowercase("https://b/"),
        ])
        .unwrap();
        assert_eq!(
            json,
            r#"[{"url":"https://a/"},{"url":"https://b/","upper":false}]"#
        );
    }
}
