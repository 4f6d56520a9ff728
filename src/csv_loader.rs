use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::code::Code;
use crate::division::{Division, Field, FieldValue};
use crate::error::Result;
use crate::html::LatestEntry;
use crate::merge::FieldMap;

/// CITAS 表的一行（只取用到的列）
#[derive(Debug, Deserialize, Clone)]
pub struct CitasRow {
    #[serde(rename = "C-gbcode")]
    pub code: Code,
    pub todate: String,
    #[serde(rename = "N-hanzi")]
    pub name_zh: String,
    #[serde(rename = "N-local")]
    pub name_local: String,
    #[serde(rename = "N-pinyin")]
    pub name_pinyin: String,
}

/// GB/T 2260-2007 表、补充表、勘误表的一行
///
/// 除 `code` 外各列都可以缺省，空单元格视为没有值。
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldRow {
    pub code: Code,
    #[serde(default)]
    pub name_zh: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub name_pinyin: Option<String>,
    #[serde(default)]
    pub alpha: Option<String>,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl FieldRow {
    /// 转为字段集合，去掉没有值的字段
    pub fn into_fields(self) -> (Code, FieldMap) {
        let mut fields = FieldMap::new();
        let texts = [
            (Field::NameZh, self.name_zh),
            (Field::NameEn, self.name_en),
            (Field::NamePinyin, self.name_pinyin),
            (Field::Alpha, self.alpha),
        ];
        for (field, value) in texts {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                fields.insert(field, FieldValue::Text(v));
            }
        }
        if let Some(level) = self.level {
            fields.insert(Field::Level, FieldValue::from(level));
        }
        if let Some(lat) = self.latitude {
            fields.insert(Field::Latitude, FieldValue::Float(lat));
        }
        if let Some(lon) = self.longitude {
            fields.insert(Field::Longitude, FieldValue::Float(lon));
        }
        (self.code, fields)
    }
}

/// 读取带表头的 CSV 文件
pub fn load_rows<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let record: T = result?;
        rows.push(record);
    }
    Ok(rows)
}

/// 读取字段表，按编码索引；同一编码出现多次时后者覆盖前者
pub fn load_field_table<P: AsRef<Path>>(path: P) -> Result<BTreeMap<Code, FieldMap>> {
    let rows: Vec<FieldRow> = load_rows(path)?;
    Ok(rows.into_iter().map(FieldRow::into_fields).collect())
}

/// 读取 `unified.csv`
pub fn load_unified<P: AsRef<Path>>(path: P) -> Result<Vec<Division>> {
    load_rows(path)
}

fn write_rows<T: Serialize, P: AsRef<Path>>(path: P, rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// 写 `latest.csv`：code, name_zh, level，按编码升序
pub fn write_latest<P: AsRef<Path>>(path: P, entries: &BTreeMap<Code, LatestEntry>) -> Result<()> {
    write_rows(path, entries.values())
}

/// 写 `unified.csv`，按编码升序，空字段写成空字符串
pub fn write_unified<P: AsRef<Path>>(path: P, divisions: &[Division]) -> Result<()> {
    let mut sorted: Vec<&Division> = divisions.iter().collect();
    sorted.sort_by_key(|d| d.code);
    write_rows(path, sorted)
}
