//! GB/T 2260 编码运算
//!
//! 六位编码按 2-2-2 分为省、地、县三组。某组为 `00` 表示没有更细的划分，
//! 行政级别 = 3 - 末尾零组的个数。所有函数都是纯运算，不查库。

use crate::error::{Error, Result};

/// 六位行政区划编码
pub type Code = u32;

/// 编码上限（不含）
const CODE_LIMIT: Code = 1_000_000;

/// 拆分为 (省, 地, 县) 三组
pub fn split(code: Code) -> (u32, u32, u32) {
    (code / 10_000, (code % 10_000) / 100, code % 100)
}

/// `split` 的逆运算
pub fn join(parts: (u32, u32, u32)) -> Code {
    parts.0 * 10_000 + parts.1 * 100 + parts.2
}

/// 不检查合法性的级别计算，只数末尾零组
fn raw_level(code: Code) -> u8 {
    let (_, prefecture, county) = split(code);
    match (prefecture, county) {
        (0, 0) => 1,
        (_, 0) => 2,
        _ => 3,
    }
}

/// 编码是否落在 2-2-2 结构内：六位以内且省组非零
pub fn is_valid(code: Code) -> bool {
    code < CODE_LIMIT && split(code).0 != 0
}

/// 行政级别，1 = 省级，2 = 地级，3 = 县级
pub fn level(code: Code) -> Result<u8> {
    if !is_valid(code) {
        return Err(Error::MalformedCode(code));
    }
    Ok(raw_level(code))
}

/// 各级祖先编码 `[省, 地, 县]`，第三项即编码本身
///
/// 省级编码的三项都是它自己，地级编码的后两项相同。
pub fn ancestors(code: Code) -> [Code; 3] {
    [code - code % 10_000, code - code % 100, code]
}

/// 指定级别上的祖先编码
pub fn ancestor_at(code: Code, level: u8) -> Result<Code> {
    match level {
        1..=3 => Ok(ancestors(code)[usize::from(level) - 1]),
        _ => Err(Error::InvalidLevel(i64::from(level))),
    }
}

/// 从省级到本级的祖先链，去重后按编码升序
pub fn lineage(code: Code) -> Result<Vec<Code>> {
    let level = level(code)?;
    Ok(ancestors(code)[..usize::from(level)].to_vec())
}

/// `a` 是否在 `b` 之内（或与 `b` 相同）
///
/// 不检查两者是否存在于数据库中。
pub fn within(a: Code, b: Code) -> bool {
    let (a1, a2, _) = split(a);
    let (b1, b2, b3) = split(b);
    match (b2, b3) {
        (0, 0) => a1 == b1,
        (_, 0) => (a1, a2) == (b1, b2),
        _ => a == b,
    }
}

/// `code` 的全部后代（含自身）所占的半开区间 `[code, code + 增量)`
///
/// 增量是把本级那一组加一。
pub fn descendant_range(code: Code) -> Result<std::ops::Range<Code>> {
    let level = level(code)?;
    let (mut p, mut f, mut c) = split(code);
    match level {
        1 => p += 1,
        2 => f += 1,
        _ => c += 1,
    }
    Ok(code..join((p, f, c)))
}
