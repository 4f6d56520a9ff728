//! 名称处理：中文名比对、英文名清理、拼音生成

use pinyin::ToPinyin;
use regex::Regex;
use zhconv::{zhconv, Variant};

/// 英文名末尾表示行政区类型的音译后缀
pub const SUFFIXES: [&str; 7] = [
    "kuangqu",   // 矿区
    "qi",        // 旗
    "qu",        // 区
    "shi",       // 市
    "xian",      // 县
    "zizhixian", // 自治县
    "zizhizhou", // 自治州
];

/// 中文名比对结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    Exact,
    Substring,
    Translated,
    TranslatedSubstring,
}

/// 判断 `candidate` 是否与官方名称 `official` 指同一地方
///
/// 依次尝试：完全相同、互为子串、把 `candidate` 转成官方名称所用的简体字后
/// 相同或互为子串。都不满足时返回 `None`。
pub fn match_names(official: &str, candidate: &str) -> Option<NameMatch> {
    if official == candidate {
        return Some(NameMatch::Exact);
    }
    if official.contains(candidate) || candidate.contains(official) {
        return Some(NameMatch::Substring);
    }
    let converted = to_simplified(candidate);
    if official == converted {
        Some(NameMatch::Translated)
    } else if official.contains(converted.as_str()) || converted.contains(official) {
        Some(NameMatch::TranslatedSubstring)
    } else {
        None
    }
}

/// 繁体转简体
pub fn to_simplified(text: &str) -> String {
    zhconv(text, Variant::ZhHans)
}

/// CITAS 数据里用反引号代替撇号
pub fn unescape_apostrophe(text: &str) -> String {
    text.replace('`', "'")
}

/// 清理 CITAS 英文名
///
/// `"Beijing: Dongcheng qu"` 中 `"Beijing: "` 是上级名称，`" qu"` 是类型，
/// 都去掉后得到 `"Dongcheng"`。`" shixiaqu"` 换成 `" city area"` 保留。
pub struct EnglishNameCleaner {
    pattern: Regex,
}

impl EnglishNameCleaner {
    pub fn new() -> Result<Self, regex::Error> {
        let pattern = format!(r"^(?:[^:]*: )?(.*?)(?: (?:{}))?$", SUFFIXES.join("|"));
        Ok(Self {
            pattern: Regex::new(&pattern)?,
        })
    }

    pub fn clean(&self, name_en: &str) -> String {
        let name_en = name_en.replace(" shixiaqu", " city area");
        match self.pattern.captures(&name_en).and_then(|c| c.get(1)) {
            Some(core) => core.as_str().to_string(),
            None => name_en,
        }
    }
}

/// 由中文名生成拼音：不带分隔符，按单词首字母大写
///
/// 非汉字字符原样保留。
pub fn pinyin_name(name_zh: &str) -> String {
    let mut plain = String::with_capacity(name_zh.len() * 3);
    for c in name_zh.chars() {
        match c.to_pinyin() {
            Some(p) => plain.push_str(p.plain()),
            None => plain.push(c),
        }
    }
    title_case(&plain)
}

/// 每段连续字母的首字母大写，其余小写
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matching() {
        assert_eq!(match_names("海淀区", "海淀区"), Some(NameMatch::Exact));
        assert_eq!(match_names("海淀区", "海淀"), Some(NameMatch::Substring));
        assert_eq!(match_names("东城区", "東城區"), Some(NameMatch::Translated));
        assert_eq!(match_names("东城区", "東城"), Some(NameMatch::TranslatedSubstring));
        assert_eq!(match_names("海淀区", "朝阳区"), None);
    }

    #[test]
    fn english_names_lose_parent_prefix_and_type_suffix() {
        let cleaner = EnglishNameCleaner::new().unwrap();
        assert_eq!(cleaner.clean("Beijing: Dongcheng qu"), "Dongcheng");
        assert_eq!(cleaner.clean("Beijing shi"), "Beijing");
        assert_eq!(cleaner.clean("Shijiazhuang shixiaqu"), "Shijiazhuang city area");
        assert_eq!(cleaner.clean("Hainan"), "Hainan");
        assert_eq!(cleaner.clean("Yanbian Chaoxianzu zizhizhou"), "Yanbian Chaoxianzu");
        // 后缀必须是独立单词
        assert_eq!(cleaner.clean("Yuqu"), "Yuqu");
    }

    #[test]
    fn apostrophes() {
        assert_eq!(unescape_apostrophe("Xi`an"), "Xi'an");
    }

    #[test]
    fn pinyin_fallback() {
        assert_eq!(pinyin_name("北京市"), "Beijingshi");
        assert_eq!(pinyin_name("海淀区"), "Haidianqu");
        assert_eq!(title_case("abc def1ghi"), "Abc Def1Ghi");
    }
}
