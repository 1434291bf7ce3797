//! 颜色解析与匹配
//!
//! 指令里的颜色可以是十六进制（#ff00aa / #f0a）或颜色名（pink、yellow ...）。
//! 颜色名匹配对象颜色时，同时接受颜色名本身和调色板里该颜色族的常见十六进制值。

use std::sync::OnceLock;

use regex::Regex;

/// 颜色名 → 规范十六进制（便签默认调色板）
const NAMED_COLORS: &[(&str, &str)] = &[
    ("yellow", "#ffeb3b"),
    ("pink", "#f8bbd0"),
    ("blue", "#90caf9"),
    ("green", "#a5d6a7"),
    ("orange", "#ffcc80"),
    ("purple", "#ce93d8"),
    ("red", "#ef9a9a"),
    ("gray", "#e0e0e0"),
    ("white", "#ffffff"),
    ("black", "#000000"),
];

/// 各颜色族额外接受的十六进制值
const COLOR_ALIASES: &[(&str, &[&str])] = &[
    ("yellow", &["#fff59d", "#ffee58", "#fdd835", "#ffff00", "#fef08a", "#fde047"]),
    ("pink", &["#f48fb1", "#ff69b4", "#ffc0cb", "#e91e63", "#fbcfe8", "#f9a8d4", "#ec4899"]),
    ("blue", &["#2196f3", "#64b5f6", "#bbdefb", "#0000ff", "#bfdbfe", "#93c5fd", "#3b82f6"]),
    ("green", &["#4caf50", "#81c784", "#c8e6c9", "#00ff00", "#bbf7d0", "#86efac", "#22c55e"]),
    ("orange", &["#ff9800", "#ffb74d", "#ffe0b2", "#ffa500", "#fed7aa", "#fb923c"]),
    ("purple", &["#9c27b0", "#ba68c8", "#e1bee7", "#800080", "#e9d5ff", "#c084fc"]),
    ("red", &["#f44336", "#e57373", "#ffcdd2", "#ff0000", "#fecaca", "#ef4444"]),
    ("gray", &["#9e9e9e", "#bdbdbd", "#eeeeee", "#808080", "#e5e7eb", "#9ca3af"]),
    ("white", &["#fff", "#fafafa"]),
    ("black", &["#000", "#212121"]),
];

static HEX_RE: OnceLock<Regex> = OnceLock::new();

fn hex_re() -> &'static Regex {
    HEX_RE.get_or_init(|| Regex::new(r"#(?:[0-9a-fA-F]{6}|[0-9a-fA-F]{3})\b").unwrap())
}

/// 指令中解析出的颜色
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorQuery {
    /// 小写十六进制
    Hex(String),
    /// 规范颜色名
    Named(&'static str),
}

impl ColorQuery {
    /// 解析单个颜色值（十六进制或颜色名，grey 视为 gray）
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        let whole_hex = hex_re()
            .find(&value)
            .is_some_and(|m| m.start() == 0 && m.end() == value.len());
        if whole_hex {
            return Some(ColorQuery::Hex(value));
        }
        canonical_name(&value).map(ColorQuery::Named)
    }

    /// 从整句指令中找颜色：十六进制优先，否则取第一个颜色名单词
    pub fn find_in(text: &str) -> Option<Self> {
        if let Some(m) = hex_re().find(text) {
            return Some(ColorQuery::Hex(m.as_str().to_lowercase()));
        }
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .find_map(|word| canonical_name(&word.to_lowercase()))
            .map(ColorQuery::Named)
    }

    /// 对象颜色是否属于该查询
    pub fn matches(&self, color: &str) -> bool {
        let color = color.trim().to_lowercase();
        match self {
            ColorQuery::Hex(hex) => color == *hex,
            ColorQuery::Named(name) => {
                color == *name
                    || canonical_name(&color) == Some(*name)
                    || color_name_for(&color) == Some(*name)
            }
        }
    }

    /// 写入对象时使用的十六进制值
    pub fn to_hex(&self) -> String {
        match self {
            ColorQuery::Hex(hex) => hex.clone(),
            ColorQuery::Named(name) => named_hex(name).unwrap_or("#ffeb3b").to_string(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ColorQuery::Hex(hex) => hex,
            ColorQuery::Named(name) => name,
        }
    }
}

fn canonical_name(word: &str) -> Option<&'static str> {
    let word = if word == "grey" { "gray" } else { word };
    NAMED_COLORS.iter().find(|(n, _)| *n == word).map(|(n, _)| *n)
}

pub fn named_hex(name: &str) -> Option<&'static str> {
    NAMED_COLORS.iter().find(|(n, _)| *n == name).map(|(_, h)| *h)
}

/// 十六进制值所属的颜色族（规范值或别名）
pub fn color_name_for(hex: &str) -> Option<&'static str> {
    let hex = hex.trim().to_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(_, h)| *h == hex)
        .map(|(n, _)| *n)
        .or_else(|| {
            COLOR_ALIASES
                .iter()
                .find(|(_, hexes)| hexes.contains(&hex.as_str()))
                .map(|(n, _)| *n)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_hex_before_name() {
        assert_eq!(
            ColorQuery::find_in("move the blue notes to #FF00AA"),
            Some(ColorQuery::Hex("#ff00aa".into()))
        );
        assert_eq!(
            ColorQuery::find_in("Move all pink sticky notes"),
            Some(ColorQuery::Named("pink"))
        );
        assert_eq!(ColorQuery::find_in("arrange notes"), None);
    }

    #[test]
    fn test_named_matches_family() {
        let pink = ColorQuery::Named("pink");
        assert!(pink.matches("#F8BBD0"));
        assert!(pink.matches("#ff69b4"));
        assert!(pink.matches("pink"));
        assert!(!pink.matches("#90caf9"));
        assert_eq!(ColorQuery::parse("grey"), Some(ColorQuery::Named("gray")));
    }

    #[test]
    fn test_hex_match_is_exact() {
        let q = ColorQuery::Hex("#ff00aa".into());
        assert!(q.matches("#FF00AA"));
        assert!(!q.matches("pink"));
        assert_eq!(q.to_hex(), "#ff00aa");
        assert_eq!(ColorQuery::Named("blue").to_hex(), "#90caf9");
    }
}
