//! 字段级合并
//!
//! 每个数据源先被读成 `编码 -> FieldMap`，再逐条合并进权威列表。
//! 只有两边都有某字段且取值不同时才算冲突，冲突按 [`Conflict`] 处理。

use std::collections::BTreeMap;

use crate::code::{self, Code};
use crate::division::{Division, Field, FieldValue};
use crate::error::{Error, Result};

/// 一条记录的字段集合，缺省字段不出现
pub type FieldMap = BTreeMap<Field, FieldValue>;

/// 冲突处理方式
pub enum Conflict<'a> {
    /// 报错，中止整个合并
    Raise,
    /// 新值覆盖旧值
    Squash,
    /// 保留旧值
    Discard,
    /// 逐字段裁决：`(字段, 旧值, 新值)`，返回 `true` 时新值覆盖
    Resolve(&'a dyn Fn(Field, &FieldValue, &FieldValue) -> bool),
}

impl Default for Conflict<'_> {
    fn default() -> Self {
        Conflict::Raise
    }
}

/// 把 `from` 合并进 `into`
///
/// `code` 只用于错误信息。`Raise` 模式下遇到冲突时 `into` 可能已被部分更新，
/// 调用方应当放弃整批结果。
pub fn merge_fields(
    code: Code,
    into: &mut FieldMap,
    from: FieldMap,
    conflict: &Conflict<'_>,
) -> Result<()> {
    for (field, new) in from {
        if let Some(old) = into.get(&field) {
            if *old != new {
                let squash = match conflict {
                    Conflict::Raise => {
                        return Err(Error::Conflict {
                            code,
                            field: field.to_string(),
                            old: old.to_string(),
                            new: new.to_string(),
                        })
                    }
                    Conflict::Squash => true,
                    Conflict::Discard => false,
                    Conflict::Resolve(decide) => decide(field, old, &new),
                };
                if !squash {
                    continue;
                }
            }
        }
        into.insert(field, new);
    }
    Ok(())
}

/// 取文本字段
pub fn text(fields: &FieldMap, field: Field) -> Option<&str> {
    fields.get(&field).and_then(FieldValue::as_str)
}

/// 把合并结果转为 [`Division`]
///
/// `name_zh` 必须非空白；级别以编码结构为准。
pub fn into_division(code: Code, mut fields: FieldMap) -> Result<Division> {
    let mut take_text = |field: Field| match fields.remove(&field) {
        Some(FieldValue::Text(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    };
    let name_zh = take_text(Field::NameZh).ok_or(Error::MissingField {
        code,
        field: "name_zh",
    })?;
    let name_en = take_text(Field::NameEn);
    let name_pinyin = take_text(Field::NamePinyin);
    let alpha = take_text(Field::Alpha);

    let level = code::level(code)?;
    let float = |field: Field| fields.get(&field).and_then(FieldValue::as_f64);

    Ok(Division {
        code,
        name_zh,
        name_en,
        name_pinyin,
        alpha,
        level,
        latitude: float(Field::Latitude),
        longitude: float(Field::Longitude),
    })
}
