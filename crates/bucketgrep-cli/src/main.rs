use anyhow::{bail, Context, Result};
use bucketgrep_core::{
    load_config, FileConfig, LocalStore, ObjectStore, OutputLayout, SearchConfig, SearchPipeline, TargetPattern,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "bucketgrep", version, about = "在对象存储前缀下搜索包含指定字节串的对象")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 搜索 bucket 中的对象，命中的对象写入本地文件
    Search(SearchArgs),
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// 要搜索的字面量（非正则，区分大小写，按原始字节匹配）
    pattern: Option<OsString>,

    /// bucket 名称（可由配置文件提供）
    #[arg(long, short)]
    bucket: Option<String>,

    /// 只搜索以此开头的 key
    #[arg(long)]
    prefix: Option<String>,

    /// 并发 worker 数；"auto"=CPU 核心数，默认 8
    #[arg(long)]
    concurrency: Option<String>,

    /// 命中文件的输出目录（默认当前目录）
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// 输出布局：flat 仅用 key 的最后一段命名（同名覆盖），nested 保留完整路径
    #[arg(long, value_enum)]
    layout: Option<Layout>,

    /// key 通道容量；0 为同步交接
    #[arg(long)]
    channel_capacity: Option<usize>,

    /// 单个对象最大字节数，超出则跳过
    #[arg(long)]
    max_object_size: Option<u64>,

    /// AWS 区域（默认 eu-west-1）
    #[arg(long)]
    region: Option<String>,

    /// 自定义 S3 endpoint（MinIO / LocalStack）
    #[arg(long)]
    endpoint: Option<String>,

    /// AWS profile 名称
    #[arg(long)]
    profile: Option<String>,

    /// 单次 S3 请求超时（秒）；默认不超时
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// 使用本地目录代替 S3：目录下的子目录即 bucket
    #[arg(long)]
    local_root: Option<PathBuf>,

    /// 配置文件路径（TOML），命令行参数优先
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    Flat,
    Nested,
}

impl From<Layout> for OutputLayout {
    fn from(l: Layout) -> Self {
        match l {
            Layout::Flat => OutputLayout::Flat,
            Layout::Nested => OutputLayout::Nested,
        }
    }
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => {
            let file = match &args.config {
                Some(path) => load_config(path)?,
                None => FileConfig::default(),
            };
            let search = build_config(&args, &file)?;
            info!(bucket = %search.bucket, prefix = %search.prefix, concurrency = search.options.concurrency, "starting search");

            let store: Arc<dyn ObjectStore> = match args.local_root.clone().or_else(|| file.local_root.clone()) {
                Some(root) => Arc::new(LocalStore::new(root)),
                None => remote_store(&args, &file)?,
            };

            // 列举失败由此返回 Err，进程以非零状态退出
            let stats = SearchPipeline::new(store, search).run()?;
            info!(
                keys = stats.keys_received,
                scanned = stats.objects_scanned,
                bytes = stats.bytes_scanned,
                matches = stats.matches_written,
                failures = stats.failures(),
                "search finished"
            );
        }
    }

    Ok(())
}

/// 合并命令行与配置文件：命令行 > 配置文件 > 默认值
fn build_config(args: &SearchArgs, file: &FileConfig) -> Result<SearchConfig> {
    let Some(bucket) = args.bucket.clone().or_else(|| file.bucket.clone()) else {
        bail!("please supply a bucket name (--bucket or config file)");
    };
    let pattern = match &args.pattern {
        Some(p) => pattern_bytes(p.clone())?,
        None => file.pattern.clone().map(String::into_bytes).unwrap_or_default(),
    };
    if pattern.is_empty() {
        bail!("search string must not be empty");
    }
    let prefix = args.prefix.clone().or_else(|| file.prefix.clone()).unwrap_or_default();

    let mut opts = file.search_options();
    if let Some(c) = &args.concurrency {
        opts.concurrency = parse_concurrency(c)?;
    }
    if opts.concurrency == 0 {
        bail!("concurrency must be at least 1");
    }
    if let Some(dir) = &args.output_dir {
        opts.output_dir = dir.clone();
    }
    if let Some(l) = args.layout {
        opts.layout = l.into();
    }
    if let Some(c) = args.channel_capacity {
        opts.channel_capacity = c;
    }
    if args.max_object_size.is_some() {
        opts.max_object_size = args.max_object_size;
    }

    let pattern = TargetPattern::new(pattern).context("build target pattern")?;
    Ok(SearchConfig::new(bucket, prefix, pattern).with_options(opts))
}

/// 命令行字面量按原始字节使用，不要求是合法 UTF-8
#[cfg(unix)]
fn pattern_bytes(arg: OsString) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStringExt;
    Ok(arg.into_vec())
}

#[cfg(not(unix))]
fn pattern_bytes(arg: OsString) -> Result<Vec<u8>> {
    match arg.into_string() {
        Ok(s) => Ok(s.into_bytes()),
        Err(raw) => bail!("search string {raw:?} is not valid UTF-8"),
    }
}

#[cfg(feature = "s3")]
fn remote_store(args: &SearchArgs, file: &FileConfig) -> Result<Arc<dyn ObjectStore>> {
    use bucketgrep_core::store::{S3Config, S3Store, DEFAULT_REGION};
    use std::time::Duration;

    let s3 = S3Config {
        region: args.region.clone().or_else(|| file.s3.region.clone()).unwrap_or_else(|| DEFAULT_REGION.to_string()),
        endpoint: args.endpoint.clone().or_else(|| file.s3.endpoint.clone()),
        profile: args.profile.clone().or_else(|| file.s3.profile.clone()),
        operation_timeout: args.timeout_secs.or(file.s3.timeout_secs).map(Duration::from_secs),
    };
    Ok(Arc::new(S3Store::connect(&s3).context("create s3 client")?))
}

#[cfg(not(feature = "s3"))]
fn remote_store(_args: &SearchArgs, _file: &FileConfig) -> Result<Arc<dyn ObjectStore>> {
    bail!("built without S3 support; use --local-root")
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 日志写到 stderr，避免与输出混在一起
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).with_writer(std::io::stderr).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析并发参数："auto" 表示 CPU 核数；其他须为 ≥ 1 的整数
fn parse_concurrency(s: &str) -> Result<usize> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(num_cpus::get());
    }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => bail!("invalid concurrency {s:?}: expected a positive integer or \"auto\""),
    }
}
