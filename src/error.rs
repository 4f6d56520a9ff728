use thiserror::Error;

use crate::code::Code;

/// 查询与合并过程中的错误
#[derive(Debug, Error)]
pub enum Error {
    /// 编码不在库中，或没有所要求级别的上级
    #[error("invalid code {0}")]
    InvalidCode(Code),

    /// 编码不符合 2-2-2 结构
    #[error("{0} is not a six-digit GB/T 2260 code")]
    MalformedCode(Code),

    #[error("{field}={value} matches {count} divisions")]
    Ambiguous {
        field: String,
        value: String,
        count: usize,
    },

    #[error("no division with {field}={value}")]
    NotFound { field: String, value: String },

    #[error("level must be 1, 2 or 3, got {0}")]
    InvalidLevel(i64),

    #[error("code {code} is at level {level}, no parent at level {requested}")]
    NoParentAtLevel { code: Code, level: u8, requested: u8 },

    #[error("{0} is not a database field")]
    UnknownField(String),

    #[error("invalid search criteria: {0}")]
    InvalidCriteria(String),

    #[error("cannot read {value:?} as a value of field {field}")]
    InvalidValue { field: String, value: String },

    /// 合并时两边同一字段取值不同，且冲突模式为 `Raise`
    #[error("code {code}: value {new:?} for field {field} would conflict with existing value {old:?}")]
    Conflict {
        code: Code,
        field: String,
        old: String,
        new: String,
    },

    #[error("code {0} appears more than once")]
    DuplicateCode(Code),

    #[error("malformed HTML entry {text:?}: {reason}")]
    Html { text: String, reason: String },

    #[error("record is missing required field {field} (code {code})")]
    MissingField { code: Code, field: &'static str },

    #[error(transparent)]
    Index(#[from] tantivy::TantivyError),

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
