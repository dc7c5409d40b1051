//! 对象存储内容搜索核心库
//!
//! 设计要点：
//! - 单个列举线程惰性产出 key，经同步通道交给 N 个 worker，边列举边读取。
//! - worker 各自复用一个内容缓冲区，对每个 key 执行 读取 → 字面量匹配 → 命中落盘。
//! - 单个 key 的失败只记录并跳过；列举失败是唯一的致命错误。
//! - 不做重试、超时或取消；卡住的存储调用会阻塞对应线程。

mod config;
mod enumerate;
mod error;
mod fetch;
mod options;
mod output;
mod pattern;
mod pipeline;
pub mod store;

pub use config::{load_config, FileConfig, S3Section};
pub use enumerate::{Enumeration, KeyEnumerator};
pub use error::{KeyError, ListError, PatternError, SearchError, StoreError};
pub use fetch::fetch_into;
pub use options::{OutputLayout, SearchOptions, SearchStats, DEFAULT_CONCURRENCY};
pub use output::{output_path, persist};
pub use pattern::TargetPattern;
pub use pipeline::{SearchConfig, SearchPipeline};
pub use store::{ListEntry, ListPage, LocalStore, ObjectStore};
