//! 错误类型
//!
//! 两级分类：
//! - 致命（`ListError` / `SearchError`）：列举失败即终止整次运行，由 CLI 映射为退出码 1。
//! - 可恢复（`KeyError`）：仅影响单个 key，记录日志后继续处理下一个 key。
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 对象存储协作方返回的错误（列举与读取共用）
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Backend(String),
}

/// 列举失败（致命）
#[derive(Debug, Error)]
#[error("could not fetch keys from {bucket}/{prefix}: {source}")]
pub struct ListError {
    pub bucket: String,
    pub prefix: String,
    #[source]
    pub source: StoreError,
}

/// 单个 key 的处理失败（可恢复）
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("could not get {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("could not read {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("object {key} exceeds {limit} bytes")]
    TooLarge { key: String, limit: u64 },
    #[error("key {key} has no usable output name")]
    InvalidName { key: String },
    #[error("could not open output file {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 构建目标模式失败
#[derive(Debug, Error)]
#[error("invalid target pattern: {0}")]
pub struct PatternError(#[from] aho_corasick::BuildError);

/// 整次运行级别的错误
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Listing(#[from] ListError),
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("could not spawn key enumerator: {0}")]
    Spawn(#[source] io::Error),
    #[error("key enumerator thread panicked")]
    EnumeratorPanicked,
}
