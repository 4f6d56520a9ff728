use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gb2260::config::{self, Config, DEFAULT_VERSION};
use gb2260::{fetch, pipeline, Code, Division, Gb2260, Search};

#[derive(Parser, Debug)]
#[command(name = "gb2260", version, about = "GB/T 2260 行政区划代码的更新与查询")]
struct Cli {
    /// 数据源目录
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// 输出目录，缺省与数据源目录相同
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 抓取网页并重新生成 latest.csv、unified.csv 和索引
    Update {
        /// 发布版本
        #[arg(long, default_value = DEFAULT_VERSION)]
        version: String,
        /// 优先使用 cache/ 中的网页
        #[arg(long)]
        cached: bool,
    },
    /// 下载全部已知版本的网页到 cache/
    RefreshCache,
    /// 查询已生成的数据
    #[command(subcommand)]
    Query(QueryCommand),
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// 行政级别
    Level { code: Code },
    /// 上级编码
    Parent {
        code: Code,
        #[arg(long)]
        level: Option<u8>,
    },
    /// A 是否在 B 之内
    Within { a: Code, b: Code },
    /// ISO 3166-2 风格的字母代码
    Isolike {
        code: Code,
        #[arg(long, default_value = gb2260::query::DEFAULT_ISO_PREFIX)]
        prefix: String,
    },
    /// 拆分为三组两位数字
    Split { code: Code },
    /// 按编码取记录
    Get { code: Code },
    /// 按字段查找
    Search(SearchArgs),
    /// 某一级的全部区划
    AllAt { level: u8 },
    /// 祖先链
    Stack { code: Code },
    /// 不指定字段，逐个字段尝试
    Lookup { value: String },
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// 查找条件，如 `name_zh=东城区`
    #[arg(required = true, value_parser = parse_pair)]
    criteria: Vec<(String, String)>,
    /// 只在这一编码的辖区内查找
    #[arg(long)]
    within: Option<Code>,
    /// 1、2、3、highest 或 lowest
    #[arg(long)]
    level: Option<String>,
    /// 前缀匹配
    #[arg(long)]
    partial: bool,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected FIELD=VALUE, got {s}"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_division(d: &Division) {
    println!("{d}");
}

fn run_query(config: &Config, command: QueryCommand) -> anyhow::Result<()> {
    let index_dir = config.output(config::UNIFIED_INDEX);
    let unified = config.output(config::UNIFIED);
    let db = Gb2260::open(&index_dir, &unified)
        .with_context(|| format!("failed to open {}", index_dir.display()))?;

    match command {
        QueryCommand::Level { code } => println!("{}", db.level(code)?),
        QueryCommand::Parent { code, level } => println!("{}", db.parent(code, level)?),
        QueryCommand::Within { a, b } => println!("{}", db.within(a, b)),
        QueryCommand::Isolike { code, prefix } => {
            println!("{}", db.isolike_with_prefix(code, &prefix)?)
        }
        QueryCommand::Split { code } => {
            let (province, prefecture, county) = db.split(code);
            println!("{province:02} {prefecture:02} {county:02}");
        }
        QueryCommand::Get { code } => print_division(&db.get(code)?),
        QueryCommand::Search(args) => {
            let mut pairs: Vec<(String, String)> = args.criteria;
            if let Some(within) = args.within {
                pairs.push(("within".into(), within.to_string()));
            }
            if let Some(level) = args.level {
                pairs.push(("level".into(), level));
            }
            if args.partial {
                pairs.push(("partial".into(), "true".into()));
            }
            let search = Search::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            print_division(&db.search(&search)?);
        }
        QueryCommand::AllAt { level } => {
            for d in db.divisions().all_at_level(level)? {
                print_division(&d);
            }
        }
        QueryCommand::Stack { code } => {
            for d in db.divisions().stack(code)? {
                print_division(&d);
            }
        }
        QueryCommand::Lookup { value } => print_division(&db.lookup(&value)?),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::new(&cli.data_dir);
    if let Some(out_dir) = cli.out_dir {
        config.out_dir = out_dir;
    }

    match cli.command {
        Command::Update { version, cached } => {
            config.version = version;
            config.use_cache = cached;
            let reconciled = pipeline::update(&config)?;
            println!("{} divisions written to {}", reconciled.divisions.len(), config.out_dir.display());
        }
        Command::RefreshCache => fetch::refresh_cache(&config)?,
        Command::Query(command) => run_query(&config, command)?,
    }
    Ok(())
}
