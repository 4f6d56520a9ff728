use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::code::Code;
use crate::error::{Error, Result};

/// 一条行政区划记录
///
/// 字段顺序即 `unified.csv` 的列顺序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Division {
    pub code: Code,
    pub name_zh: String,
    pub name_en: Option<String>,
    pub name_pinyin: Option<String>,
    /// 两到三位字母代码，只有省级、地级才有
    pub alpha: Option<String>,
    pub level: u8,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Division {
    pub fn is_province(&self) -> bool {
        self.level == 1
    }

    pub fn is_prefecture(&self) -> bool {
        self.level == 2
    }

    pub fn is_county(&self) -> bool {
        self.level == 3
    }

    /// 按字段取值，缺省字段返回 `None`
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        let text = |s: &Option<String>| s.clone().map(FieldValue::Text);
        match field {
            Field::Code => Some(FieldValue::Int(u64::from(self.code))),
            Field::NameZh => Some(FieldValue::Text(self.name_zh.clone())),
            Field::NameEn => text(&self.name_en),
            Field::NamePinyin => text(&self.name_pinyin),
            Field::Alpha => text(&self.alpha),
            Field::Level => Some(FieldValue::Int(u64::from(self.level))),
            Field::Latitude => self.latitude.map(FieldValue::Float),
            Field::Longitude => self.longitude.map(FieldValue::Float),
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t(level {})", self.code, self.name_zh, self.level)?;
        if let Some(name_en) = &self.name_en {
            write!(f, "\t{name_en}")?;
        }
        Ok(())
    }
}

/// 数据库字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Code,
    NameZh,
    NameEn,
    NamePinyin,
    Alpha,
    Level,
    Latitude,
    Longitude,
}

/// 字段取值的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
    Float,
}

impl Field {
    /// 按 `unified.csv` 列顺序排列的全部字段
    pub const ALL: [Field; 8] = [
        Field::Code,
        Field::NameZh,
        Field::NameEn,
        Field::NamePinyin,
        Field::Alpha,
        Field::Level,
        Field::Latitude,
        Field::Longitude,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Code => "code",
            Field::NameZh => "name_zh",
            Field::NameEn => "name_en",
            Field::NamePinyin => "name_pinyin",
            Field::Alpha => "alpha",
            Field::Level => "level",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Code | Field::Level => FieldKind::Int,
            Field::Latitude | Field::Longitude => FieldKind::Float,
            _ => FieldKind::Text,
        }
    }

    /// `name_zh`、`name_en`、`name_pinyin`
    pub fn is_name(self) -> bool {
        self.name().starts_with("name_")
    }

    /// 把字符串解析为本字段类型的值
    pub fn parse_value(self, raw: &str) -> Result<FieldValue> {
        let invalid = || Error::InvalidValue {
            field: self.name().to_string(),
            value: raw.to_string(),
        };
        match self.kind() {
            FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldKind::Int => raw.trim().parse().map(FieldValue::Int).map_err(|_| invalid()),
            FieldKind::Float => raw.trim().parse().map(FieldValue::Float).map_err(|_| invalid()),
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| Error::UnknownField(s.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 一个字段的取值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(u64),
    Float(f64),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(u64::from(v))
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Int(u64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}
