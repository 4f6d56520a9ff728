use std::cmp::Reverse;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use tantivy::collector::DocSetCollector;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::{self, IndexRecordOption, Schema, Value, FAST, INDEXED, STORED, STRING};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::info;

use crate::code::{self, Code};
use crate::csv_loader::load_unified;
use crate::division::{Division, Field, FieldKind, FieldValue};
use crate::error::{Error, Result};

/// 写索引时的内存预算
const WRITER_MEMORY: usize = 50_000_000;

/// 按级别消歧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// 只要这一级
    Exact(u8),
    /// 取级别数字最小（行政级别最高）的一条
    Highest,
    /// 取级别数字最大（行政级别最低）的一条
    Lowest,
}

impl FromStr for LevelFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "highest" => Ok(LevelFilter::Highest),
            "lowest" => Ok(LevelFilter::Lowest),
            _ => {
                let level: i64 = s
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidCriteria(format!("level={s}")))?;
                match level {
                    1..=3 => Ok(LevelFilter::Exact(level as u8)),
                    _ => Err(Error::InvalidLevel(level)),
                }
            }
        }
    }
}

/// 一次按字段查找：一个字段条件，加上可选的范围、级别和前缀匹配
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub field: Field,
    pub value: FieldValue,
    /// 只在这一编码的辖区内查找
    pub within: Option<Code>,
    pub level: Option<LevelFilter>,
    /// 前缀匹配（区分大小写），只适用于文本字段
    pub partial: bool,
}

impl Search {
    pub fn new(field: Field, value: impl Into<FieldValue>) -> Self {
        Self {
            field,
            value: value.into(),
            within: None,
            level: None,
            partial: false,
        }
    }

    pub fn within(mut self, code: Code) -> Self {
        self.within = Some(code);
        self
    }

    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = Some(level);
        self
    }

    pub fn partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// 从 `键=值` 形式的参数构造
    ///
    /// `within`、`level`、`partial` 是修饰项，其余的键必须恰好一个，且是数据库字段。
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut within = None;
        let mut level = None;
        let mut partial = false;
        let mut criteria = Vec::new();

        for (key, value) in pairs {
            match key {
                "within" => {
                    let code = value
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidCriteria(format!("within={value}")))?;
                    within = Some(code);
                }
                "level" => level = Some(value.parse()?),
                "partial" => {
                    partial = value
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidCriteria(format!("partial={value}")))?;
                }
                _ => criteria.push((key.parse::<Field>()?, value)),
            }
        }

        let (field, raw) = match criteria.as_slice() {
            [one] => *one,
            [] => return Err(Error::InvalidCriteria("no field to search on".into())),
            _ => {
                let names: Vec<&str> = criteria.iter().map(|(f, _)| f.name()).collect();
                return Err(Error::InvalidCriteria(format!(
                    "expected exactly one field, got {}",
                    names.join(", ")
                )));
            }
        };

        Ok(Self {
            field,
            value: field.parse_value(raw)?,
            within,
            level,
            partial,
        })
    }
}

/// 索引中各字段的句柄
#[derive(Debug, Clone, Copy)]
struct IndexFields {
    code: schema::Field,
    name_zh: schema::Field,
    name_en: schema::Field,
    name_pinyin: schema::Field,
    alpha: schema::Field,
    level: schema::Field,
    latitude: schema::Field,
    longitude: schema::Field,
}

impl IndexFields {
    fn schema() -> Schema {
        let mut schema_builder = Schema::builder();
        schema_builder.add_u64_field("code", INDEXED | STORED | FAST);
        // 名称不分词，只做整值或前缀匹配
        schema_builder.add_text_field("name_zh", STRING | STORED);
        schema_builder.add_text_field("name_en", STRING | STORED);
        schema_builder.add_text_field("name_pinyin", STRING | STORED);
        schema_builder.add_text_field("alpha", STRING | STORED);
        schema_builder.add_u64_field("level", INDEXED | STORED);
        schema_builder.add_f64_field("latitude", INDEXED | STORED);
        schema_builder.add_f64_field("longitude", INDEXED | STORED);
        schema_builder.build()
    }

    fn from_schema(schema: &Schema) -> Result<Self> {
        Ok(Self {
            code: schema.get_field(Field::Code.name())?,
            name_zh: schema.get_field(Field::NameZh.name())?,
            name_en: schema.get_field(Field::NameEn.name())?,
            name_pinyin: schema.get_field(Field::NamePinyin.name())?,
            alpha: schema.get_field(Field::Alpha.name())?,
            level: schema.get_field(Field::Level.name())?,
            latitude: schema.get_field(Field::Latitude.name())?,
            longitude: schema.get_field(Field::Longitude.name())?,
        })
    }

    fn get(&self, field: Field) -> schema::Field {
        match field {
            Field::Code => self.code,
            Field::NameZh => self.name_zh,
            Field::NameEn => self.name_en,
            Field::NamePinyin => self.name_pinyin,
            Field::Alpha => self.alpha,
            Field::Level => self.level,
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
        }
    }

    fn document(&self, division: &Division) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_u64(self.code, u64::from(division.code));
        doc.add_text(self.name_zh, &division.name_zh);
        let texts = [
            (self.name_en, &division.name_en),
            (self.name_pinyin, &division.name_pinyin),
            (self.alpha, &division.alpha),
        ];
        for (field, value) in texts {
            if let Some(v) = value {
                doc.add_text(field, v);
            }
        }
        doc.add_u64(self.level, u64::from(division.level));
        if let Some(lat) = division.latitude {
            doc.add_f64(self.latitude, lat);
        }
        if let Some(lon) = division.longitude {
            doc.add_f64(self.longitude, lon);
        }
        doc
    }

    fn division(&self, doc: &TantivyDocument) -> Result<Division> {
        let text = |field: schema::Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let int = |field: schema::Field| doc.get_first(field).and_then(|v| v.as_u64());
        let float = |field: schema::Field| doc.get_first(field).and_then(|v| v.as_f64());

        let code = int(self.code).ok_or(Error::MissingField {
            code: 0,
            field: "code",
        })? as Code;
        let missing = |field: &'static str| Error::MissingField { code, field };

        Ok(Division {
            code,
            name_zh: text(self.name_zh).ok_or_else(|| missing("name_zh"))?,
            name_en: text(self.name_en),
            name_pinyin: text(self.name_pinyin),
            alpha: text(self.alpha),
            level: int(self.level).ok_or_else(|| missing("level"))? as u8,
            latitude: float(self.latitude),
            longitude: float(self.longitude),
        })
    }
}

/// 行政区划索引：建好之后只读
pub struct DivisionIndex {
    index: Index,
    reader: IndexReader,
    fields: IndexFields,
    /// 全部记录，首次遍历时载入
    all: OnceLock<Vec<Division>>,
}

impl DivisionIndex {
    /// 在内存中建索引
    pub fn build_in_ram(divisions: &[Division]) -> Result<Self> {
        let index = Index::create_in_ram(IndexFields::schema());
        Self::build(index, divisions)
    }

    /// 在目录中建索引，目录已存在时先清空
    pub fn build_in_dir<P: AsRef<Path>>(dir: P, divisions: &[Division]) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        fs::create_dir_all(dir)?;
        let index = Index::create_in_dir(dir, IndexFields::schema())?;
        Self::build(index, divisions)
    }

    /// 打开已有的索引目录
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let index = Index::open_in_dir(dir)?;
        Self::with_index(index)
    }

    /// 打开索引目录；目录不存在时由 `unified.csv` 建立
    pub fn open_or_build<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, unified_csv: Q) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.join("meta.json").exists() {
            return Self::open(dir);
        }
        info!("索引 {} 不存在，由 {} 建立", dir.display(), unified_csv.as_ref().display());
        let divisions = load_unified(unified_csv)?;
        Self::build_in_dir(dir, &divisions)
    }

    fn build(index: Index, divisions: &[Division]) -> Result<Self> {
        let fields = IndexFields::from_schema(&index.schema())?;

        // 单线程写入，段内文档顺序与输入一致
        let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY)?;
        for division in divisions {
            index_writer.add_document(fields.document(division))?;
        }
        index_writer.commit()?;
        drop(index_writer);

        Self::with_index(index)
    }

    fn with_index(index: Index) -> Result<Self> {
        let fields = IndexFields::from_schema(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            index,
            reader,
            fields,
            all: OnceLock::new(),
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// 执行查询，结果按编码升序
    fn collect(&self, query: &dyn Query) -> Result<Vec<Division>> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(query, &DocSetCollector)?;
        let mut result = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            result.push(self.fields.division(&doc)?);
        }
        result.sort_by_key(|d| d.code);
        Ok(result)
    }

    fn term(&self, field: Field, value: &FieldValue) -> Result<Term> {
        let handle = self.fields.get(field);
        match (field.kind(), value) {
            (FieldKind::Text, FieldValue::Text(s)) => Ok(Term::from_field_text(handle, s)),
            (FieldKind::Int, FieldValue::Int(v)) => Ok(Term::from_field_u64(handle, *v)),
            (FieldKind::Float, FieldValue::Float(v)) => Ok(Term::from_field_f64(handle, *v)),
            (FieldKind::Float, FieldValue::Int(v)) => Ok(Term::from_field_f64(handle, *v as f64)),
            _ => Err(Error::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            }),
        }
    }

    fn term_query(&self, field: Field, value: &FieldValue) -> Result<Box<dyn Query>> {
        let term = self.term(field, value)?;
        Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
    }

    fn matching(&self, field: Field, value: &FieldValue) -> Result<Vec<Division>> {
        let query = self.term_query(field, value)?;
        self.collect(query.as_ref())
    }

    /// 按编码精确查找
    pub fn get(&self, code: Code) -> Result<Division> {
        self.matching(Field::Code, &FieldValue::from(code))?
            .into_iter()
            .next()
            .ok_or(Error::InvalidCode(code))
    }

    pub fn contains(&self, code: Code) -> Result<bool> {
        match self.get(code) {
            Ok(_) => Ok(true),
            Err(Error::InvalidCode(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 按任一字段精确查找，要求恰好一条
    pub fn get_by_field(&self, field: Field, value: impl Into<FieldValue>) -> Result<Division> {
        let value = value.into();
        let found = self.matching(field, &value)?;
        exactly_one(field, &value, found)
    }

    /// 某一级的全部区划，按编码升序
    pub fn all_at_level(&self, level: u8) -> Result<Vec<Division>> {
        if !(1..=3).contains(&level) {
            return Err(Error::InvalidLevel(i64::from(level)));
        }
        self.matching(Field::Level, &FieldValue::from(level))
    }

    /// 通用查找
    pub fn search(&self, search: &Search) -> Result<Division> {
        let Search {
            field,
            ref value,
            within,
            level,
            partial,
        } = *search;

        let main: Box<dyn Query> = if partial {
            let prefix = value.as_str().filter(|_| field.kind() == FieldKind::Text).ok_or_else(|| {
                Error::InvalidCriteria(format!("partial matching needs a text field, not {field}"))
            })?;
            let pattern = format!("{}.*", regex::escape(prefix));
            Box::new(RegexQuery::from_pattern(&pattern, self.fields.get(field))?)
        } else {
            self.term_query(field, value)?
        };

        let query: Box<dyn Query> = match level {
            Some(LevelFilter::Exact(n)) => {
                if !(1..=3).contains(&n) {
                    return Err(Error::InvalidLevel(i64::from(n)));
                }
                let by_level = self.term_query(Field::Level, &FieldValue::from(n))?;
                Box::new(BooleanQuery::new(vec![(Occur::Must, main), (Occur::Must, by_level)]))
            }
            _ => main,
        };

        let mut found = self.collect(query.as_ref())?;

        if let Some(scope) = within {
            let range = code::descendant_range(scope)?;
            found.retain(|d| range.contains(&d.code));
        }

        // 同级之间取编码最小的一条
        let picked = match level {
            Some(LevelFilter::Highest) => found.into_iter().min_by_key(|d| (d.level, d.code)),
            Some(LevelFilter::Lowest) => found.into_iter().min_by_key(|d| (Reverse(d.level), d.code)),
            _ => return exactly_one(field, value, found),
        };
        picked.ok_or_else(|| Error::NotFound {
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    /// 从省级到 `code` 本身的祖先链
    pub fn stack(&self, code: Code) -> Result<Vec<Division>> {
        code::lineage(code)?
            .into_iter()
            .map(|c| self.get(c).map_err(|e| blame(code, e)))
            .collect()
    }

    /// 全部记录，按编码升序
    pub fn all(&self) -> Result<&[Division]> {
        if let Some(all) = self.all.get() {
            return Ok(all);
        }
        let loaded = self.collect(&AllQuery)?;
        Ok(self.all.get_or_init(|| loaded))
    }

    pub fn iter(&self) -> Result<std::slice::Iter<'_, Division>> {
        Ok(self.all()?.iter())
    }

    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 祖先缺失时报告所查的编码，其余错误原样返回
fn blame(code: Code, err: Error) -> Error {
    match err {
        Error::InvalidCode(_) => Error::InvalidCode(code),
        other => other,
    }
}

fn exactly_one(field: Field, value: &FieldValue, mut found: Vec<Division>) -> Result<Division> {
    match found.len() {
        0 => Err(Error::NotFound {
            field: field.to_string(),
            value: value.to_string(),
        }),
        1 => Ok(found.remove(0)),
        count => Err(Error::Ambiguous {
            field: field.to_string(),
            value: value.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn division(code: Code, name_zh: &str, name_en: Option<&str>, alpha: Option<&str>) -> Division {
        Division {
            code,
            name_zh: name_zh.to_string(),
            name_en: name_en.map(str::to_string),
            name_pinyin: None,
            alpha: alpha.map(str::to_string),
            level: code::level(code).unwrap(),
            latitude: None,
            longitude: None,
        }
    }

    fn sample() -> DivisionIndex {
        let divisions = vec![
            division(110000, "北京市", Some("Beijing"), Some("BJ")),
            division(110100, "市辖区", None, Some("BJS")),
            division(110108, "海淀区", Some("Haidian"), None),
            division(150303, "海南区", Some("Hainan"), None),
            division(310000, "上海市", Some("Shanghai"), Some("SH")),
            division(310100, "市辖区", None, None),
            division(460000, "海南省", Some("Hainan"), Some("HI")),
        ];
        DivisionIndex::build_in_ram(&divisions).unwrap()
    }

    #[test]
    fn level_filters_parse() {
        assert_eq!("highest".parse::<LevelFilter>().unwrap(), LevelFilter::Highest);
        assert_eq!("2".parse::<LevelFilter>().unwrap(), LevelFilter::Exact(2));
        assert!(matches!("4".parse::<LevelFilter>(), Err(Error::InvalidLevel(4))));
        assert!(matches!("x".parse::<LevelFilter>(), Err(Error::InvalidCriteria(_))));
    }

    #[test]
    fn pairs_need_exactly_one_field() {
        let s = Search::from_pairs([("name_zh", "市辖区"), ("within", "110000")]).unwrap();
        assert_eq!(s.field, Field::NameZh);
        assert_eq!(s.within, Some(110000));

        assert!(matches!(Search::from_pairs([("within", "110000")]), Err(Error::InvalidCriteria(_))));
        assert!(matches!(
            Search::from_pairs([("name_zh", "a"), ("name_en", "b")]),
            Err(Error::InvalidCriteria(_))
        ));
        assert!(matches!(Search::from_pairs([("foo", "1")]), Err(Error::UnknownField(_))));
        assert!(matches!(Search::from_pairs([("code", "abc")]), Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn point_lookups() {
        let index = sample();
        assert_eq!(index.len(), 7);
        assert_eq!(index.get(110108).unwrap().name_zh, "海淀区");
        assert!(matches!(index.get(990000), Err(Error::InvalidCode(990000))));
        assert_eq!(index.get_by_field(Field::Alpha, "HI").unwrap().code, 460000);
        assert!(matches!(
            index.get_by_field(Field::NameZh, "市辖区"),
            Err(Error::Ambiguous { count: 2, .. })
        ));
        assert!(matches!(
            index.get_by_field(Field::NameZh, "天津市"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn search_modifiers() {
        let index = sample();
        let hainan = || Search::new(Field::NameEn, "Hainan");

        assert!(matches!(index.search(&hainan()), Err(Error::Ambiguous { .. })));
        assert_eq!(index.search(&hainan().level(LevelFilter::Exact(1))).unwrap().code, 460000);
        assert_eq!(index.search(&hainan().level(LevelFilter::Exact(3))).unwrap().code, 150303);
        assert_eq!(index.search(&hainan().level(LevelFilter::Highest)).unwrap().code, 460000);
        assert_eq!(index.search(&hainan().level(LevelFilter::Lowest)).unwrap().code, 150303);

        let district = Search::new(Field::NameZh, "市辖区").within(110000);
        assert_eq!(index.search(&district).unwrap().code, 110100);

        let prefix = Search::new(Field::NameEn, "Hai").partial(true).within(110000);
        assert_eq!(index.search(&prefix).unwrap().code, 110108);
        let prefix = Search::new(Field::NameEn, "hai").partial(true);
        assert!(matches!(index.search(&prefix), Err(Error::NotFound { .. })));
    }

    #[test]
    fn levels_and_stacks() {
        let index = sample();
        let provinces: Vec<Code> = index.all_at_level(1).unwrap().iter().map(|d| d.code).collect();
        assert_eq!(provinces, vec![110000, 310000, 460000]);
        assert!(matches!(index.all_at_level(0), Err(Error::InvalidLevel(0))));
        assert!(matches!(index.all_at_level(4), Err(Error::InvalidLevel(4))));

        let stack: Vec<Code> = index.stack(110108).unwrap().iter().map(|d| d.code).collect();
        assert_eq!(stack, vec![110000, 110100, 110108]);
        assert!(matches!(index.stack(150303), Err(Error::InvalidCode(150303))));
        assert!(matches!(index.stack(990101), Err(Error::InvalidCode(990101))));
        assert!(matches!(index.stack(99), Err(Error::MalformedCode(99))));

        let all: Vec<Code> = index.iter().unwrap().map(|d| d.code).collect();
        assert_eq!(all.len(), 7);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn only_missing_ancestors_become_invalid_code() {
        assert!(matches!(
            blame(110108, Error::InvalidCode(110100)),
            Error::InvalidCode(110108)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert!(matches!(blame(110108, Error::Io(io)), Error::Io(_)));
    }
}
