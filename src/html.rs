//! 解析国家统计局发布的行政区划代码网页
//!
//! 各年份网页的排版不同：
//!
//! - 2012：表格，一行一条，编码和名称之间只有空白，级别由编码推断；
//! - 2013：段落，编码和名称之间有 3、5 或 7 个 `&nbsp;`，个数表示级别；
//! - 2014 起：段落内嵌 `<span>`，第一个是编码，最后一个是名称，
//!   名称前的全角空格个数表示级别。

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::code::{self, Code};
use crate::error::{Error, Result};

const NBSP: char = '\u{a0}';
const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// 网页中的一条记录，也是 `latest.csv` 的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestEntry {
    pub code: Code,
    pub name_zh: String,
    pub level: u8,
}

/// 网页排版
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    TableRows,
    NbspRuns,
    Spans,
}

impl Layout {
    /// 按发布年份选择排版
    pub fn for_year(year: u32) -> Self {
        match year {
            ..=2012 => Layout::TableRows,
            2013 => Layout::NbspRuns,
            _ => Layout::Spans,
        }
    }

    fn selector(self) -> &'static str {
        match self {
            Layout::TableRows => "div.TRS_Editor table.MsoNormalTable tr",
            Layout::NbspRuns | Layout::Spans => "div.TRS_Editor p.MsoNormal",
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Html {
        text: css.to_string(),
        reason: format!("{e:?}"),
    })
}

fn html_error(text: &str, reason: impl Into<String>) -> Error {
    Error::Html {
        text: text.to_string(),
        reason: reason.into(),
    }
}

/// 解析整页，返回按编码索引的记录
///
/// 同一编码出现两次视为网页有误。
pub fn parse_html(html: &str, layout: Layout) -> Result<BTreeMap<Code, LatestEntry>> {
    let document = Html::parse_document(html);
    let top = selector(layout.selector())?;
    let span = selector("span")?;

    let mut result = BTreeMap::new();
    let mut previous: Option<Code> = None;

    for elem in document.select(&top) {
        // 文本节点之间补空格，避免相邻单元格粘连
        let text = elem.text().collect::<Vec<_>>().join(" ");
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        // 表头、说明文字等不以编码开头的段落
        if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            debug!("跳过非编码段落 {:?}", trimmed);
            continue;
        }

        let entry = match layout {
            Layout::TableRows => from_bare_text(&text)?,
            Layout::NbspRuns => from_nbsp_runs(&text)?,
            Layout::Spans => from_spans(elem, &span, &text)?,
        };

        if previous.is_some_and(|p| p > entry.code) {
            warn!("编码 {} 出现在 {} 之后，网页顺序不是升序", entry.code, previous.unwrap_or_default());
        }
        previous = Some(entry.code);

        let code = entry.code;
        if result.insert(code, entry).is_some() {
            return Err(Error::DuplicateCode(code));
        }
    }

    Ok(result)
}

/// 按空白切分：第一段是编码，最后一段是名称，级别由编码推断
fn from_bare_text(text: &str) -> Result<LatestEntry> {
    let mut tokens = text.split_whitespace();
    let first = tokens.next().ok_or_else(|| html_error(text, "empty entry"))?;
    let name_zh = tokens.last().ok_or_else(|| html_error(text, "no name after code"))?;
    let code: Code = first
        .parse()
        .map_err(|_| html_error(text, format!("{first:?} is not a code")))?;
    Ok(LatestEntry {
        code,
        name_zh: name_zh.to_string(),
        level: code::level(code)?,
    })
}

/// 编码与名称之间的 `&nbsp;` 个数为 3、5、7，对应级别 1、2、3
fn from_nbsp_runs(text: &str) -> Result<LatestEntry> {
    // 去掉零散的普通空格后再按 &nbsp; 切分
    let compact = text.replace(' ', "");
    let parts: Vec<&str> = compact.trim_matches(|c: char| c != NBSP && c.is_whitespace()).split(NBSP).collect();
    let run = parts.len() - 1;
    if !matches!(run, 3 | 5 | 7) {
        return Err(html_error(text, format!("{run} non-breaking spaces, expected 3, 5 or 7")));
    }
    let code: Code = parts[0]
        .parse()
        .map_err(|_| html_error(text, format!("{:?} is not a code", parts[0])))?;
    code::level(code)?;
    let name_zh = parts[run].trim();
    if name_zh.is_empty() {
        return Err(html_error(text, "no name after code"));
    }
    Ok(LatestEntry {
        code,
        name_zh: name_zh.to_string(),
        level: ((run - 1) / 2) as u8,
    })
}

/// 第一个 span 是编码，最后一个 span 是名称，名称前的全角空格数是级别
///
/// 取不到编码时退回到按空白切分。
fn from_spans(elem: ElementRef<'_>, span: &Selector, text: &str) -> Result<LatestEntry> {
    let spans: Vec<ElementRef<'_>> = elem.select(span).collect();
    let (Some(first), Some(last)) = (spans.first(), spans.last()) else {
        debug!("没有 span，按纯文本解析 {:?}", text);
        return from_bare_text(text);
    };

    let code_text: String = first.text().collect();
    let Ok(code) = code_text.trim().parse::<Code>() else {
        debug!("按纯文本解析 {:?}", text);
        return from_bare_text(text);
    };

    let structural = code::level(code)?;

    let name_text: String = last.text().collect();
    let name_zh = name_text.trim();
    if name_zh.is_empty() {
        debug!("最后一个 span 为空，按纯文本解析 {:?}", text);
        return from_bare_text(text);
    }

    let indent = name_text.chars().filter(|&c| c == IDEOGRAPHIC_SPACE).count();
    let level = match indent {
        1..=3 => indent as u8,
        _ => {
            debug!("{} 的全角空格数为 {}，按编码推断级别为 {}", code, indent, structural);
            structural
        }
    };

    Ok(LatestEntry {
        code,
        name_zh: name_zh.to_string(),
        level,
    })
}
