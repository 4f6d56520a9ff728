//! 以网页上的现行编码为准，合并各数据源
//!
//! 现行列表决定最终有哪些编码，其他数据源只能补充字段，不会新增编码。
//! 编码按升序处理，保证处理到县级「市辖区」时上级的英文名已经确定。

use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::code::{self, Code};
use crate::division::{Division, Field, FieldValue};
use crate::error::Result;
use crate::html::LatestEntry;
use crate::merge::{into_division, merge_fields, text, Conflict, FieldMap};
use crate::names::{match_names, pinyin_name, to_simplified, EnglishNameCleaner};
use crate::sources::Sources;

/// 通用占位名称「市辖区」
pub const MUNICIPAL_DISTRICT: &str = "市辖区";

/// 合并某一编码时记下的情况
#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    CitasMissing,
    CitasMismatch { name_zh: String, simplified: String },
    StandardMissing,
    StandardMismatch { name_zh: String },
    LevelMismatch { listed: u8, structural: u8 },
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::CitasMissing => write!(f, "  CITAS 中没有该编码"),
            Note::CitasMismatch { name_zh, simplified } => {
                write!(f, "  CITAS 名称 {name_zh}（{simplified}）不符")
            }
            Note::StandardMissing => write!(f, "  GB/T 2260-2007 中没有该编码"),
            Note::StandardMismatch { name_zh } => {
                write!(f, "  GB/T 2260-2007 名称 {name_zh} 不符")
            }
            Note::LevelMismatch { listed, structural } => {
                write!(f, "  网页上的级别 {listed} 与编码结构的级别 {structural} 不符")
            }
        }
    }
}

/// 某一编码的合并记录，第一行是编码和名称
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub code: Code,
    pub name_zh: String,
    pub notes: Vec<Note>,
}

impl Diagnostics {
    /// 只有 CITAS 中存在该编码、却仍有问题时才值得提示
    pub fn is_notable(&self) -> bool {
        matches!(self.notes.first(), Some(note) if *note != Note::CitasMissing)
    }

    fn emit(&self) {
        if self.notes.is_empty() {
            return;
        }
        if self.is_notable() {
            info!("{}", self);
        } else {
            debug!("{}", self);
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.code, self.name_zh)?;
        for note in &self.notes {
            write!(f, "\n{note}")?;
        }
        Ok(())
    }
}

/// 合并结果
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// 按编码升序
    pub divisions: Vec<Division>,
    /// 只包含有记录的编码
    pub diagnostics: Vec<Diagnostics>,
}

/// GB/T 2260-2007 的空名称不覆盖已有名称，其余冲突以 GB/T 为准
fn standard_wins(field: Field, _old: &FieldValue, new: &FieldValue) -> bool {
    !(field.is_name() && new.as_str().is_some_and(str::is_empty))
}

/// 合并全部数据源
///
/// 任何 `Raise` 冲突都会使整批合并失败。
pub fn reconcile(latest: &BTreeMap<Code, LatestEntry>, sources: &Sources) -> Result<Reconciled> {
    let cleaner = EnglishNameCleaner::new()?;
    let mut done: BTreeMap<Code, Division> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    info!("正在合并 {} 个编码", latest.len());

    for (&code, official) in latest {
        let mut entry = FieldMap::from([
            (Field::NameZh, FieldValue::Text(official.name_zh.clone())),
            (Field::Level, FieldValue::from(official.level)),
        ]);
        let mut trail = Diagnostics {
            code,
            name_zh: official.name_zh.clone(),
            notes: Vec::new(),
        };

        // 1. CITAS：名称对不上就整条跳过
        match sources.citas.get(&code) {
            Some(citas) if match_names(&official.name_zh, &citas.name_zh).is_none() => {
                trail.notes.push(Note::CitasMismatch {
                    name_zh: citas.name_zh.clone(),
                    simplified: to_simplified(&citas.name_zh),
                });
            }
            Some(citas) => merge_fields(code, &mut entry, citas.fields(), &Conflict::Raise)?,
            None => trail.notes.push(Note::CitasMissing),
        }

        // 2. GB/T 2260-2007：有名称且不同才跳过，空名称不影响合并
        match sources.standard.get(&code) {
            Some(standard) => match text(standard, Field::NameZh) {
                Some(name_zh) if name_zh != official.name_zh => {
                    trail.notes.push(Note::StandardMismatch {
                        name_zh: name_zh.to_string(),
                    });
                }
                _ => merge_fields(
                    code,
                    &mut entry,
                    standard.clone(),
                    &Conflict::Resolve(&standard_wins),
                )?,
            },
            None => trail.notes.push(Note::StandardMissing),
        }

        // 3. 勘误表无条件覆盖
        if let Some(correction) = sources.corrections.get(&code) {
            merge_fields(code, &mut entry, correction.clone(), &Conflict::Squash)?;
        }

        // 4. 英文名
        match text(&entry, Field::NameEn).map(|name_en| cleaner.clean(name_en)) {
            Some(name_en) if !name_en.is_empty() => {
                entry.insert(Field::NameEn, FieldValue::Text(name_en));
            }
            Some(_) => {
                entry.remove(&Field::NameEn);
            }
            None if text(&entry, Field::NameZh) == Some(MUNICIPAL_DISTRICT) => {
                let parent = code::ancestors(code)[1];
                if let Some(name_en) = done.get(&parent).and_then(|p| p.name_en.as_deref()) {
                    entry.insert(Field::NameEn, FieldValue::Text(format!("{name_en} city area")));
                }
            }
            None => {}
        }

        // 5. 拼音
        if text(&entry, Field::NamePinyin).is_none() {
            if let Some(name_zh) = text(&entry, Field::NameZh) {
                let name_pinyin = pinyin_name(name_zh);
                entry.insert(Field::NamePinyin, FieldValue::Text(name_pinyin));
            }
        }

        // 只核对网页上的级别，其他数据源的级别列不参与
        let structural = code::level(code)?;
        if official.level != structural {
            warn!("{} 的级别 {} 与编码结构不符，改为 {}", code, official.level, structural);
            trail.notes.push(Note::LevelMismatch {
                listed: official.level,
                structural,
            });
        }

        trail.emit();
        if !trail.notes.is_empty() {
            diagnostics.push(trail);
        }

        done.insert(code, into_division(code, entry)?);
    }

    info!("合并完成");
    Ok(Reconciled {
        divisions: done.into_values().collect(),
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::CitasEntry;

    fn latest(entries: &[(Code, &str)]) -> BTreeMap<Code, LatestEntry> {
        entries
            .iter()
            .map(|&(code, name)| {
                let entry = LatestEntry {
                    code,
                    name_zh: name.to_string(),
                    level: code::level(code).unwrap(),
                };
                (code, entry)
            })
            .collect()
    }

    fn citas(name_zh: &str, local: &str, pinyin: &str) -> CitasEntry {
        CitasEntry {
            name_zh: name_zh.to_string(),
            name_en: local.to_string(),
            name_pinyin: pinyin.to_string(),
        }
    }

    #[test]
    fn only_listed_codes_survive() {
        let latest = latest(&[(110000, "北京市")]);
        let mut sources = Sources::default();
        sources.citas.insert(120000, citas("天津市", "Tianjin shi", "Tianjin shi"));
        sources
            .standard
            .insert(130000, FieldMap::from([(Field::Alpha, FieldValue::from("HE"))]));

        let out = reconcile(&latest, &sources).unwrap();
        assert_eq!(out.divisions.len(), 1);
        assert_eq!(out.divisions[0].code, 110000);
        assert_eq!(out.divisions[0].name_pinyin.as_deref(), Some("Beijingshi"));
    }

    #[test]
    fn citas_mismatch_skips_the_whole_entry() {
        let latest = latest(&[(110108, "海淀区")]);
        let mut sources = Sources::default();
        sources.citas.insert(110108, citas("朝阳区", "Beijing: Chaoyang qu", "Chaoyang qu"));

        let out = reconcile(&latest, &sources).unwrap();
        let d = &out.divisions[0];
        assert!(d.name_en.is_none());
        assert_eq!(d.name_pinyin.as_deref(), Some("Haidianqu"));
        assert!(out.diagnostics[0].is_notable());
        assert!(matches!(out.diagnostics[0].notes[0], Note::CitasMismatch { .. }));
    }

    #[test]
    fn standard_name_mismatch_skips_merge_but_empty_name_does_not() {
        let latest = latest(&[(130000, "河北省"), (130100, "石家庄市")]);
        let mut sources = Sources::default();
        sources.standard.insert(
            130000,
            FieldMap::from([
                (Field::NameZh, FieldValue::from("河北")),
                (Field::Alpha, FieldValue::from("HE")),
            ]),
        );
        sources
            .standard
            .insert(130100, FieldMap::from([(Field::Alpha, FieldValue::from("SJW"))]));

        let out = reconcile(&latest, &sources).unwrap();
        assert_eq!(out.divisions[0].alpha, None);
        assert_eq!(out.divisions[1].alpha.as_deref(), Some("SJW"));
        assert!(!out.diagnostics[0].is_notable());
    }

    #[test]
    fn english_names_are_cleaned_and_city_areas_synthesized() {
        let latest = latest(&[(130000, "河北省"), (130100, "石家庄市"), (130101, "市辖区")]);
        let mut sources = Sources::default();
        sources.citas.insert(130000, citas("河北省", "Hebei sheng", "Hebei sheng"));
        sources
            .citas
            .insert(130100, citas("石家莊市", "Hebei: Shijiazhuang shi", "Shijiazhuang shi"));

        let out = reconcile(&latest, &sources).unwrap();
        let by_code: BTreeMap<Code, &Division> = out.divisions.iter().map(|d| (d.code, d)).collect();
        assert_eq!(by_code[&130000].name_en.as_deref(), Some("Hebei sheng"));
        assert_eq!(by_code[&130100].name_en.as_deref(), Some("Shijiazhuang"));
        assert_eq!(by_code[&130100].name_pinyin.as_deref(), Some("Shijiazhuang shi"));
        assert_eq!(by_code[&130101].name_en.as_deref(), Some("Shijiazhuang city area"));
    }

    #[test]
    fn corrections_win_over_citas() {
        let latest = latest(&[(110000, "北京市")]);
        let mut sources = Sources::default();
        sources.citas.insert(110000, citas("北京市", "Beijing shi", "Beijing shi"));
        sources.corrections.insert(
            110000,
            FieldMap::from([(Field::NameEn, FieldValue::from("Peking"))]),
        );
        let out = reconcile(&latest, &sources).unwrap();
        assert_eq!(out.divisions[0].name_en.as_deref(), Some("Peking"));
        assert_eq!(out.divisions[0].name_pinyin.as_deref(), Some("Beijing shi"));
    }

    #[test]
    fn level_check_uses_the_listed_level() {
        let mut latest = latest(&[(110000, "北京市"), (110100, "市辖区")]);
        if let Some(entry) = latest.get_mut(&110100) {
            entry.level = 3;
        }
        let mut sources = Sources::default();
        // 勘误表的级别列不影响核对
        sources
            .corrections
            .insert(110000, FieldMap::from([(Field::Level, FieldValue::from(2u8))]));
        sources
            .corrections
            .insert(110100, FieldMap::from([(Field::Level, FieldValue::from(2u8))]));

        let out = reconcile(&latest, &sources).unwrap();
        let notes: BTreeMap<Code, &Vec<Note>> =
            out.diagnostics.iter().map(|d| (d.code, &d.notes)).collect();
        assert!(!notes[&110000].iter().any(|n| matches!(n, Note::LevelMismatch { .. })));
        assert!(notes[&110100].contains(&Note::LevelMismatch {
            listed: 3,
            structural: 2
        }));
        assert_eq!(out.divisions[1].level, 2);
    }
}
