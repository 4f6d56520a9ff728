use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};

use crate::html::Layout;

/// 国家统计局行政区划代码页面的公共前缀
pub const BASE_URL: &str = "http://www.stats.gov.cn/tjsj/tjbz/xzqhdm/";

/// 已知的发布版本（截止日期）及其页面
pub const VERSIONS: [(&str, &str); 4] = [
    ("2015-09-30", "201608/t20160809_1386477.html"),
    ("2014-10-31", "201504/t20150415_712722.html"),
    ("2013-08-31", "201401/t20140116_501070.html"),
    ("2012-10-31", "201301/t20130118_38316.html"),
];

pub const DEFAULT_VERSION: &str = "2015-09-30";

/// 输入输出文件名
pub const CITAS: &str = "citas.csv";
pub const STANDARD: &str = "gbt_2260-2007.csv";
pub const STANDARD_SUP: &str = "gbt_2260-2007_sup.csv";
pub const CORRECTIONS: &str = "extra.csv";
pub const LATEST: &str = "latest.csv";
pub const UNIFIED: &str = "unified.csv";
pub const UNIFIED_INDEX: &str = "unified.index";

/// 某一版本的页面地址
pub fn version_url(version: &str) -> Option<String> {
    VERSIONS
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, page)| format!("{BASE_URL}{page}"))
}

/// 运行参数
#[derive(Debug, Clone)]
pub struct Config {
    /// 数据源表格和 `cache/` 所在目录
    pub data_dir: PathBuf,
    /// 输出目录
    pub out_dir: PathBuf,
    /// 发布版本，如 `2015-09-30`
    pub version: String,
    /// 优先读取缓存的网页
    pub use_cache: bool,
}

impl Config {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            out_dir: data_dir.as_ref().to_path_buf(),
            version: DEFAULT_VERSION.to_string(),
            use_cache: false,
        }
    }

    pub fn url(&self) -> anyhow::Result<String> {
        version_url(&self.version).ok_or_else(|| {
            let known: Vec<&str> = VERSIONS.iter().map(|(v, _)| *v).collect();
            anyhow!("unknown version {}, expected one of {}", self.version, known.join(", "))
        })
    }

    /// 版本号前四位是年份，决定网页排版
    pub fn layout(&self) -> anyhow::Result<Layout> {
        let year: u32 = self
            .version
            .get(..4)
            .and_then(|y| y.parse().ok())
            .with_context(|| format!("version {} does not start with a year", self.version))?;
        Ok(Layout::for_year(year))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn cache_path(&self, version: &str) -> PathBuf {
        self.cache_dir().join(format!("{version}.html"))
    }

    pub fn source(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn output(&self, file: &str) -> PathBuf {
        self.out_dir.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_map_to_urls_and_layouts() {
        let mut config = Config::new("data");
        assert_eq!(
            config.url().unwrap(),
            "http://www.stats.gov.cn/tjsj/tjbz/xzqhdm/201608/t20160809_1386477.html"
        );
        assert_eq!(config.layout().unwrap(), Layout::Spans);
        assert_eq!(config.cache_path("2013-08-31"), Path::new("data/cache/2013-08-31.html"));

        config.version = "2012-10-31".to_string();
        assert_eq!(config.layout().unwrap(), Layout::TableRows);

        config.version = "1999-01-01".to_string();
        assert!(config.url().is_err());
    }
}
