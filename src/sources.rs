//! 读取三个补充数据源，整理成 `编码 -> 字段` 的形式
//!
//! - CITAS：1982–1992 年的国标编码，带英文名和拼音；
//! - GB/T 2260-2007：主表与补充表，先合并成一张；
//! - 勘误表：按现行编码给出的修正，合并时无条件覆盖。

use std::collections::BTreeMap;
use std::path::Path;

use crate::code::Code;
use crate::csv_loader::{load_field_table, load_rows, CitasRow};
use crate::division::{Field, FieldValue};
use crate::error::Result;
use crate::merge::{merge_fields, Conflict, FieldMap};
use crate::names::unescape_apostrophe;

/// CITAS 中仍然有效的记录，其 `todate` 为这一天
pub const CITAS_VALID_TODATE: &str = "19941231";

/// CITAS 的一条有效记录
#[derive(Debug, Clone, PartialEq)]
pub struct CitasEntry {
    /// 只用于核对名称，不并入结果
    pub name_zh: String,
    pub name_en: String,
    pub name_pinyin: String,
}

impl CitasEntry {
    /// 要并入结果的字段
    pub fn fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        if !self.name_en.is_empty() {
            fields.insert(Field::NameEn, FieldValue::Text(self.name_en.clone()));
        }
        if !self.name_pinyin.is_empty() {
            fields.insert(Field::NamePinyin, FieldValue::Text(self.name_pinyin.clone()));
        }
        fields
    }
}

/// 只保留有效期截至 [`CITAS_VALID_TODATE`] 的行，并还原撇号
pub fn citas_from_rows(rows: impl IntoIterator<Item = CitasRow>) -> BTreeMap<Code, CitasEntry> {
    rows.into_iter()
        .filter(|row| row.todate == CITAS_VALID_TODATE)
        .map(|row| {
            let entry = CitasEntry {
                name_zh: row.name_zh,
                name_en: unescape_apostrophe(&row.name_local),
                name_pinyin: unescape_apostrophe(&row.name_pinyin),
            };
            (row.code, entry)
        })
        .collect()
}

pub fn load_citas<P: AsRef<Path>>(path: P) -> Result<BTreeMap<Code, CitasEntry>> {
    let rows: Vec<CitasRow> = load_rows(path)?;
    Ok(citas_from_rows(rows))
}

/// 把补充表并入主表
///
/// 两表都有的编码逐字段合并，补充表的 `name_zh` 不覆盖主表；
/// 只在补充表中出现的编码原样加入。
pub fn merge_standard(
    mut primary: BTreeMap<Code, FieldMap>,
    supplement: BTreeMap<Code, FieldMap>,
) -> Result<BTreeMap<Code, FieldMap>> {
    let keep_primary_name = |field: Field, _: &FieldValue, _: &FieldValue| field != Field::NameZh;
    for (code, fields) in supplement {
        match primary.get_mut(&code) {
            Some(existing) => {
                merge_fields(code, existing, fields, &Conflict::Resolve(&keep_primary_name))?
            }
            None => {
                primary.insert(code, fields);
            }
        }
    }
    Ok(primary)
}

/// 权威列表之外的全部数据源
#[derive(Debug, Default, Clone)]
pub struct Sources {
    pub citas: BTreeMap<Code, CitasEntry>,
    pub standard: BTreeMap<Code, FieldMap>,
    pub corrections: BTreeMap<Code, FieldMap>,
}

impl Sources {
    /// 从数据目录读取 `citas.csv`、`gbt_2260-2007.csv`、
    /// `gbt_2260-2007_sup.csv`、`extra.csv`
    pub fn load(
        citas: &Path,
        standard: &Path,
        standard_sup: &Path,
        corrections: &Path,
    ) -> Result<Self> {
        Ok(Self {
            citas: load_citas(citas)?,
            standard: merge_standard(load_field_table(standard)?, load_field_table(standard_sup)?)?,
            corrections: load_field_table(corrections)?,
        })
    }
}
