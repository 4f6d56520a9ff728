//! 对外的只读查询接口

use std::path::Path;

use crate::code::{self, Code};
use crate::division::{Division, Field};
use crate::division_index::{DivisionIndex, Search};
use crate::error::{Error, Result};

/// `isolike` 的默认前缀
pub const DEFAULT_ISO_PREFIX: &str = "CN-";

/// 行政区划查询
///
/// 持有一份建好的 [`DivisionIndex`]，由调用方在启动时构造后传入。
pub struct Gb2260 {
    divisions: DivisionIndex,
}

impl Gb2260 {
    pub fn new(divisions: DivisionIndex) -> Self {
        Self { divisions }
    }

    /// 打开索引目录，目录不存在时由 `unified.csv` 建立
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(index_dir: P, unified_csv: Q) -> Result<Self> {
        Ok(Self::new(DivisionIndex::open_or_build(index_dir, unified_csv)?))
    }

    pub fn divisions(&self) -> &DivisionIndex {
        &self.divisions
    }

    pub fn get(&self, code: Code) -> Result<Division> {
        self.divisions.get(code)
    }

    pub fn search(&self, search: &Search) -> Result<Division> {
        self.divisions.search(search)
    }

    /// 库中记录的行政级别
    pub fn level(&self, code: Code) -> Result<u8> {
        Ok(self.divisions.get(code)?.level)
    }

    /// 上级编码
    ///
    /// `parent_level` 缺省为本级减一。编码或所求的上级不在库中时返回
    /// [`Error::InvalidCode`]；级别不在 1–3，或不高于本级时返回级别错误。
    pub fn parent(&self, code: Code, parent_level: Option<u8>) -> Result<Code> {
        let own = code::level(code).map_err(|_| Error::InvalidCode(code))?;
        if !self.divisions.contains(code)? {
            return Err(Error::InvalidCode(code));
        }

        if let Some(requested) = parent_level.filter(|l| !(1..=3).contains(l)) {
            return Err(Error::InvalidLevel(i64::from(requested)));
        }
        // 省级没有默认的上级
        let parent_level = parent_level.unwrap_or(own - 1);
        if parent_level == 0 || parent_level >= own {
            return Err(Error::NoParentAtLevel {
                code,
                level: own,
                requested: parent_level,
            });
        }

        let candidate = code::ancestor_at(code, parent_level)?;
        if !self.divisions.contains(candidate)? {
            return Err(Error::InvalidCode(code));
        }
        Ok(candidate)
    }

    /// `a` 是否在 `b` 之内，不查库
    pub fn within(&self, a: Code, b: Code) -> bool {
        code::within(a, b)
    }

    pub fn split(&self, code: Code) -> (u32, u32, u32) {
        code::split(code)
    }

    /// 类似 ISO 3166-2 的字母代码，如 `CN-HE-SJW`
    pub fn isolike(&self, code: Code) -> Result<String> {
        self.isolike_with_prefix(code, DEFAULT_ISO_PREFIX)
    }

    /// 祖先链上每一级都必须有字母代码，县级没有，因此县级编码总是失败
    pub fn isolike_with_prefix(&self, code: Code, prefix: &str) -> Result<String> {
        let parts = self
            .divisions
            .stack(code)?
            .into_iter()
            .map(|d| d.alpha.ok_or(Error::InvalidCode(code)))
            .collect::<Result<Vec<String>>>()?;
        Ok(format!("{prefix}{}", parts.join("-")))
    }

    /// 祖先链的中文名，如 `北京市/市辖区/东城区`
    pub fn stack_names(&self, code: Code) -> Result<String> {
        let names: Vec<String> = self
            .divisions
            .stack(code)?
            .into_iter()
            .map(|d| d.name_zh)
            .collect();
        Ok(names.join("/"))
    }

    /// 不指定字段的查找：按列顺序逐个字段尝试，返回第一个唯一匹配
    pub fn lookup(&self, value: &str) -> Result<Division> {
        for field in Field::ALL {
            let Ok(parsed) = field.parse_value(value) else {
                continue;
            };
            match self.divisions.get_by_field(field, parsed) {
                Ok(division) => return Ok(division),
                Err(Error::NotFound { .. } | Error::Ambiguous { .. } | Error::InvalidValue { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Err(Error::NotFound {
            field: "any field".to_string(),
            value: value.to_string(),
        })
    }
}
