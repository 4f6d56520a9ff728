//! 获取行政区划代码网页：在线下载或读取缓存

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::fs;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::info;

use crate::config::{version_url, Config, VERSIONS};

const USER_AGENT: &str = concat!("gb2260/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(60);

fn client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

fn download(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("bad response from {url}"))?;
    let bytes = response
        .bytes()
        .with_context(|| format!("failed to read body of {url}"))?;
    Ok(bytes.to_vec())
}

/// 取得 `config.version` 对应的网页
///
/// `use_cache` 时先读 `cache/<version>.html`，缓存不存在则改为在线下载。
pub fn read_page(config: &Config) -> Result<String> {
    if config.use_cache {
        let path = config.cache_path(&config.version);
        info!("读取缓存 {}", path.display());
        match fs::read_to_string(&path) {
            Ok(html) => return Ok(html),
            Err(e) if e.kind() == ErrorKind::NotFound => info!("  缓存不存在"),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    let url = config.url()?;
    info!("正在下载 {}", url);
    let bytes = download(&client()?, &url)?;
    String::from_utf8(bytes).with_context(|| format!("{url} is not valid UTF-8"))
}

/// 下载全部已知版本的网页到 `cache/`
pub fn refresh_cache(config: &Config) -> Result<()> {
    let client = client()?;
    let dir = config.cache_dir();
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    for (version, _) in VERSIONS {
        let url = version_url(version).with_context(|| format!("no URL for {version}"))?;
        info!("正在保存 {}", url);
        let bytes = download(&client, &url)?;

        let path = config.cache_path(version);
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        info!("  保存到 {}", path.display());
    }
    Ok(())
}
