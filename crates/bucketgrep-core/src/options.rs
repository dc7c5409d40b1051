//! 搜索选项与统计信息（模块）
use std::path::PathBuf;

use serde::Deserialize;

/// 默认 worker 数
pub const DEFAULT_CONCURRENCY: usize = 8;

/// 输出文件布局
/// - Flat：仅使用 key 的最后一段作为文件名；不同 key 同名时后写覆盖先写。
/// - Nested：在输出目录下按 key 的完整路径建目录，不会冲突。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    #[default]
    Flat,
    Nested,
}

/// 搜索选项
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// 并发 worker 数，必须 ≥ 1
    pub concurrency: usize,
    /// key 通道容量；0 表示同步交接（生产者等待某个 worker 取走）
    pub channel_capacity: usize,
    /// 命中文件写入目录
    pub output_dir: PathBuf,
    pub layout: OutputLayout,
    /// 单个对象的最大读取字节数；超过则跳过该 key
    pub max_object_size: Option<u64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            channel_capacity: 0,
            output_dir: PathBuf::from("."),
            layout: OutputLayout::Flat,
            max_object_size: None,
        }
    }
}

/// 搜索统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchStats {
    pub keys_received: u64,
    pub objects_scanned: u64,
    pub bytes_scanned: u64,
    pub matches_written: u64,
    pub fetch_failures: u64,
    pub read_failures: u64,
    pub write_failures: u64,
    pub skipped_too_large: u64,
    pub invalid_names: u64,
}

impl SearchStats {
    /// 合并某个 worker 的统计
    pub fn merge(&mut self, other: &SearchStats) {
        self.keys_received += other.keys_received;
        self.objects_scanned += other.objects_scanned;
        self.bytes_scanned += other.bytes_scanned;
        self.matches_written += other.matches_written;
        self.fetch_failures += other.fetch_failures;
        self.read_failures += other.read_failures;
        self.write_failures += other.write_failures;
        self.skipped_too_large += other.skipped_too_large;
        self.invalid_names += other.invalid_names;
    }

    /// 可恢复失败的总数
    pub fn failures(&self) -> u64 {
        self.fetch_failures + self.read_failures + self.write_failures + self.skipped_too_large + self.invalid_names
    }
}
