//! 更新流程：取网页、解析、合并、写出 `latest.csv`、`unified.csv` 和索引

use anyhow::{bail, Context, Result};
use std::fs;
use tracing::info;

use crate::config::{self, Config};
use crate::csv_loader::{write_latest, write_unified};
use crate::division_index::DivisionIndex;
use crate::fetch;
use crate::html::parse_html;
use crate::reconcile::{reconcile, Reconciled};
use crate::sources::Sources;

/// 完整更新：按配置取网页后执行 [`update_from_html`]
pub fn update(config: &Config) -> Result<Reconciled> {
    let html = fetch::read_page(config)?;
    update_from_html(config, &html)
}

/// 由已取得的网页执行更新
///
/// 全部合并完成后才开始写文件，合并失败时不产生任何输出。
pub fn update_from_html(config: &Config, html: &str) -> Result<Reconciled> {
    let layout = config.layout()?;
    info!("正在解析 {} 版网页", config.version);
    let latest = parse_html(html, layout).context("failed to parse division page")?;
    if latest.is_empty() {
        bail!("no division codes found on the {} page", config.version);
    }
    info!("  共 {} 个编码", latest.len());

    let sources = Sources::load(
        &config.source(config::CITAS),
        &config.source(config::STANDARD),
        &config.source(config::STANDARD_SUP),
        &config.source(config::CORRECTIONS),
    )
    .with_context(|| format!("failed to load sources from {}", config.data_dir.display()))?;

    let reconciled = reconcile(&latest, &sources).context("failed to reconcile sources")?;
    let notable = reconciled.diagnostics.iter().filter(|d| d.is_notable()).count();
    info!("  {} 个编码有需要注意的情况", notable);

    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("failed to create {}", config.out_dir.display()))?;

    let latest_path = config.output(config::LATEST);
    write_latest(&latest_path, &latest)
        .with_context(|| format!("failed to write {}", latest_path.display()))?;
    info!("写入 {}", latest_path.display());

    let unified_path = config.output(config::UNIFIED);
    write_unified(&unified_path, &reconciled.divisions)
        .with_context(|| format!("failed to write {}", unified_path.display()))?;
    info!("写入 {}", unified_path.display());

    let index_path = config.output(config::UNIFIED_INDEX);
    DivisionIndex::build_in_dir(&index_path, &reconciled.divisions)
        .with_context(|| format!("failed to build index in {}", index_path.display()))?;
    info!("写入 {}", index_path.display());

    Ok(reconciled)
}
