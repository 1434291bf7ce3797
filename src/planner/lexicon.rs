//! 指令词法工具：数量解析、单词匹配、引号短语
//!
//! 数量既可以是数字（"create 250 notes"），也可以是连续的英文数词
//! （"two hundred and fifty"），支持 one…ninety、hundred 与连接词 and。
//! 引号里的文字和 #十六进制 颜色不参与数量解析（"Q3"、"#123456" 不是数量）。

use std::sync::OnceLock;

use regex::Regex;

/// 指向便签的名词（也包括泛指的 objects / ones）
pub const STICKY_TARGETS: &[&str] = &[
    "sticky", "stickies", "note", "notes", "postit", "postits", "ones", "object", "objects", "item", "items",
    "card", "cards",
];

/// 形状与连接线名词：出现且没有便签目标时，不按便签解释
pub const SHAPE_NOUNS: &[&str] = &[
    "shape", "shapes", "circle", "circles", "rectangle", "rectangles", "square", "squares", "line", "lines",
    "connector", "connectors", "arrow", "arrows", "frame", "frames",
];

pub const CREATE_VERBS: &[&str] = &["create", "add", "make", "generate", "draw", "build", "place", "put", "insert"];

pub const MOVE_VERBS: &[&str] = &["move", "put", "shift", "drag", "place", "send", "push", "bring"];

pub const ARRANGE_VERBS: &[&str] = &["arrange", "organize", "organise", "layout", "lay", "sort", "align", "tidy", "put"];

const UNIT_WORDS: &[(&str, u64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
];

static HEX_RE: OnceLock<Regex> = OnceLock::new();
static QUOTED_RE: OnceLock<Regex> = OnceLock::new();

/// 数量短语后最多看几个词来判断它修饰的名词
const NOUN_WINDOW: usize = 3;

fn hex_re() -> &'static Regex {
    HEX_RE.get_or_init(|| Regex::new(r"#[0-9a-fA-F]+").unwrap())
}

fn quoted_re() -> &'static Regex {
    QUOTED_RE.get_or_init(|| Regex::new(r#"["“]([^"”]+)["”]|'([^']+)'"#).unwrap())
}

/// 小写单词切分（非字母数字为分隔符；post-it 合并为 postit）
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace("post-it", "postit")
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn has_word(words: &[String], word: &str) -> bool {
    words.iter().any(|w| w == word)
}

pub fn has_any_word(words: &[String], candidates: &[&str]) -> bool {
    words.iter().any(|w| candidates.contains(&w.as_str()))
}

fn number_word(word: &str) -> Option<u64> {
    UNIT_WORDS.iter().find(|(w, _)| *w == word).map(|(_, v)| *v)
}

/// 一个数量短语：值与所占词的区间 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CountPhrase {
    value: u64,
    start: usize,
    end: usize,
}

/// 数量解析用的词：去掉引号短语和十六进制颜色，小写，按非字母数字切分
fn count_tokens(text: &str) -> Vec<String> {
    let stripped = quoted_re().replace_all(text, " ");
    let stripped = hex_re().replace_all(&stripped, " ");
    stripped
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// 找出所有数量短语：独立的数字词，或连续的数词（中间可夹 and）
fn count_phrases(tokens: &[String]) -> Vec<CountPhrase> {
    let mut phrases = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if token.bytes().all(|b| b.is_ascii_digit()) {
            // 超长数字串视为极大值，由调用方截断
            let value = token.parse::<u64>().unwrap_or(u64::MAX);
            phrases.push(CountPhrase { value, start: i, end: i + 1 });
            i += 1;
            continue;
        }
        if number_word(token).is_none() && token != "hundred" {
            i += 1;
            continue;
        }

        let mut value: u64 = 0;
        let mut end = i;
        for (j, t) in tokens.iter().enumerate().skip(i) {
            match t.as_str() {
                "and" => continue,
                "hundred" => value = value.max(1).saturating_mul(100),
                w => match number_word(w) {
                    Some(v) => value = value.saturating_add(v),
                    None => break,
                },
            }
            end = j + 1;
        }
        phrases.push(CountPhrase { value, start: i, end });
        i = end;
    }
    phrases
}

/// 解析指令中的数量：取第一个数量短语；引号内文字和颜色值里的数字不算
pub fn parse_count(text: &str) -> Option<u64> {
    count_phrases(&count_tokens(text)).first().map(|p| p.value)
}

/// 解析修饰指定名词的数量："50 circles and 20 sticky ones" 对便签取 20。
/// 没有数量紧跟这些名词时退回第一个数量。
pub fn parse_count_for(text: &str, nouns: &[&str]) -> Option<u64> {
    let tokens = count_tokens(text);
    let phrases = count_phrases(&tokens);
    let describes_noun = |idx: usize| {
        let phrase = phrases[idx];
        let limit = phrases
            .get(idx + 1)
            .map_or(tokens.len(), |next| next.start)
            .min(phrase.end + NOUN_WINDOW);
        tokens[phrase.end..limit].iter().any(|t| nouns.contains(&t.as_str()))
    };
    (0..phrases.len())
        .find(|&idx| describes_noun(idx))
        .or_else(|| (!phrases.is_empty()).then_some(0))
        .map(|idx| phrases[idx].value)
}

/// 第一个引号内的短语（支持直引号、弯引号、单引号）
pub fn quoted_phrase(text: &str) -> Option<String> {
    let caps = quoted_re().captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
