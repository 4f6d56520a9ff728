//! 中华人民共和国县以上行政区划代码（GB/T 2260）
//!
//! 从国家统计局网页抓取现行代码，与 CITAS、GB/T 2260-2007 和勘误表合并，
//! 写成 `unified.csv` 并建立 tantivy 索引供查询。

pub mod code;
pub mod config;
pub mod csv_loader;
pub mod division;
pub mod division_index;
pub mod error;
pub mod fetch;
pub mod html;
pub mod merge;
pub mod names;
pub mod pipeline;
pub mod query;
pub mod reconcile;
pub mod sources;

pub use code::Code;
pub use config::Config;
pub use division::{Division, Field, FieldValue};
pub use division_index::{DivisionIndex, LevelFilter, Search};
pub use error::{Error, Result};
pub use query::Gb2260;
