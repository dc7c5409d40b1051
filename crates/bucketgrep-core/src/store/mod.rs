//! 对象存储协作方抽象
//!
//! 核心流程只依赖两个操作：分页列举 key、按 key 读取对象内容流。
//! 具体后端：
//! - `LocalStore`：以本地目录模拟存储（bucket = 子目录）
//! - `S3Store`：基于 aws-sdk-s3（需启用 `s3` feature）
use std::io::Read;

use crate::error::StoreError;

mod local;
#[cfg(feature = "s3")]
mod s3;

pub use local::{LocalStore, DEFAULT_PAGE_SIZE};
#[cfg(feature = "s3")]
pub use s3::{S3Config, S3Store, DEFAULT_REGION};

/// 列举结果中的单个条目；`key` 为空表示条目结构不完整，调用方应跳过
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListEntry {
    pub key: Option<String>,
}

impl ListEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: Some(key.into()) }
    }
}

/// 一页列举结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    /// 下一页的续传标记；`None` 表示这是最后一页
    pub next: Option<String>,
}

impl ListPage {
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

/// 对象存储（阻塞接口，可跨线程共享）
pub trait ObjectStore: Send + Sync {
    /// 列举 `bucket` 下以 `prefix` 开头的一页 key
    ///
    /// 错误与“零结果”必须可区分：前缀下没有对象时返回空页而非错误。
    fn list_page(&self, bucket: &str, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError>;

    /// 打开对象内容流；调用方读完后丢弃即视为关闭
    fn get_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError>;
}
