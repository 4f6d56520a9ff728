use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gb2260::config::{self, Config};
use gb2260::csv_loader::load_unified;
use gb2260::pipeline;
use gb2260::reconcile::Note;
use gb2260::{Code, Division, DivisionIndex};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// 读缓存网页，输出到临时目录，不联网
fn config(out_dir: &Path) -> Config {
    let mut config = Config::new(fixtures());
    config.out_dir = out_dir.to_path_buf();
    config.use_cache = true;
    config
}

fn by_code(divisions: &[Division]) -> BTreeMap<Code, &Division> {
    divisions.iter().map(|d| (d.code, d)).collect()
}

#[test]
fn update_merges_all_sources() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let reconciled = pipeline::update(&config(out.path()))?;
    let divisions = by_code(&reconciled.divisions);

    // 网页上的编码全部保留，CITAS 中过期的唐山市不会出现
    assert_eq!(divisions.len(), 21);
    assert!(!divisions.contains_key(&130200));

    let beijing = divisions[&110000];
    assert_eq!(beijing.name_en.as_deref(), Some("Beijing"));
    assert_eq!(beijing.name_pinyin.as_deref(), Some("Beijing shi"));
    assert_eq!(beijing.alpha.as_deref(), Some("BJ"));
    assert_eq!(beijing.latitude, Some(39.9042));

    assert_eq!(divisions[&110101].name_en.as_deref(), Some("Dongcheng"));
    assert_eq!(divisions[&130100].name_en.as_deref(), Some("Shijiazhuang"));
    assert_eq!(divisions[&130100].alpha.as_deref(), Some("SJW"));
    assert_eq!(divisions[&130101].name_en.as_deref(), Some("Shijiazhuang city area"));
    assert_eq!(divisions[&130102].name_en.as_deref(), Some("Chang'an"));
    assert_eq!(divisions[&310100].name_en.as_deref(), Some("Shanghai city area"));
    assert_eq!(divisions[&331024].name_en.as_deref(), Some("Xianju"));

    // 补充表的名称不覆盖主表，其余字段覆盖
    assert_eq!(divisions[&331000].name_zh, "台州市");
    assert_eq!(divisions[&331000].alpha.as_deref(), Some("TZO"));

    // CITAS 名称对不上，整条不用
    let linzhi = divisions[&542621];
    assert_eq!(linzhi.name_en, None);
    assert!(linzhi.name_pinyin.is_some());
    assert!(linzhi.is_county());

    let notes: BTreeMap<Code, &Vec<Note>> = reconciled
        .diagnostics
        .iter()
        .map(|d| (d.code, &d.notes))
        .collect();
    assert!(matches!(notes[&542621][0], Note::CitasMismatch { .. }));
    assert!(notes[&150303].contains(&Note::StandardMismatch { name_zh: "海南".into() }));
    assert_eq!(notes[&110100][0], Note::CitasMissing);
    assert!(!notes.contains_key(&110000));
    Ok(())
}

#[test]
fn outputs_round_trip_through_csv_and_index() -> anyhow::Result<()> {
    let out = tempfile::tempdir()?;
    let reconciled = pipeline::update(&config(out.path()))?;

    let latest = fs::read_to_string(out.path().join(config::LATEST))?;
    let mut lines = latest.lines();
    assert_eq!(lines.next(), Some("code,name_zh,level"));
    assert_eq!(lines.next(), Some("110000,北京市,1"));
    assert_eq!(lines.count(), 20);

    let reloaded = load_unified(out.path().join(config::UNIFIED))?;
    assert_eq!(reloaded, reconciled.divisions);

    let index = DivisionIndex::open(out.path().join(config::UNIFIED_INDEX))?;
    assert_eq!(index.all()?, reconciled.divisions.as_slice());
    Ok(())
}

#[test]
fn reruns_are_byte_identical() -> anyhow::Result<()> {
    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    pipeline::update(&config(first.path()))?;
    pipeline::update(&config(second.path()))?;
    // 同一目录再跑一次，覆盖旧索引
    pipeline::update(&config(second.path()))?;

    for file in [config::LATEST, config::UNIFIED] {
        let a = fs::read(first.path().join(file))?;
        let b = fs::read(second.path().join(file))?;
        assert_eq!(a, b, "{file} differs between runs");
    }
    Ok(())
}

/// 把网页和数据源复制到临时目录，`extra.csv` 由调用方给出
fn data_dir(corrections: Option<&str>) -> anyhow::Result<tempfile::TempDir> {
    let data = tempfile::tempdir()?;
    for file in [config::CITAS, config::STANDARD, config::STANDARD_SUP] {
        fs::copy(fixtures().join(file), data.path().join(file))?;
    }
    if let Some(corrections) = corrections {
        fs::write(data.path().join(config::CORRECTIONS), corrections)?;
    }
    Ok(data)
}

fn cached_page() -> anyhow::Result<String> {
    Ok(fs::read_to_string(fixtures().join("cache/2015-09-30.html"))?)
}

#[test]
fn missing_source_writes_nothing() -> anyhow::Result<()> {
    // 勘误表缺失，读取数据源失败
    let data = data_dir(None)?;
    let out = tempfile::tempdir()?;
    let mut config = Config::new(data.path());
    config.out_dir = out.path().join("out");

    assert!(pipeline::update_from_html(&config, &cached_page()?).is_err());
    assert!(!config.out_dir.exists());
    Ok(())
}

#[test]
fn failed_merge_writes_nothing() -> anyhow::Result<()> {
    // 勘误表把北京市的名称改成全角空格，合并时缺少中文名
    let data = data_dir(Some("code,name_zh,name_en\n110000,\u{3000},Beijing\n"))?;
    let out = tempfile::tempdir()?;
    let mut config = Config::new(data.path());
    config.out_dir = out.path().join("out");

    let err = pipeline::update_from_html(&config, &cached_page()?).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<gb2260::Error>(),
        Some(gb2260::Error::MissingField { code: 110000, field: "name_zh" })
    ));
    assert!(!config.out_dir.exists());
    Ok(())
}

#[test]
fn page_without_codes_writes_nothing() -> anyhow::Result<()> {
    let data = data_dir(Some("code,name_zh\n"))?;
    let out = tempfile::tempdir()?;
    let mut config = Config::new(data.path());
    config.out_dir = out.path().join("out");

    let html = "<html><body><div class=\"TRS_Editor\"><p class=\"MsoNormal\">说明</p></div></body></html>";
    assert!(pipeline::update_from_html(&config, html).is_err());
    assert!(!config.out_dir.exists());
    Ok(())
}
