//! 本地目录后端
//!
//! 根目录下每个子目录视为一个 bucket，文件相对路径（以 `/` 连接）即 key。
//! 列举时对 key 排序后按页返回，续传标记为上一页最后一个 key（start-after 语义）。
//! 首页（无续传标记）遍历一次目录并保存快照，后续页从快照切片，
//! 列举过程中新增或删除的文件不影响本轮结果。
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use walkdir::WalkDir;

use super::{ListEntry, ListPage, ObjectStore};
use crate::error::StoreError;

/// 默认每页条目数（与 S3 ListObjectsV2 上限一致）
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// 一轮列举的 key 快照
#[derive(Debug)]
struct Snapshot {
    bucket: String,
    prefix: String,
    keys: Arc<Vec<String>>,
}

#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    page_size: usize,
    snapshot: Mutex<Option<Snapshot>>,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), page_size: DEFAULT_PAGE_SIZE, snapshot: Mutex::new(None) }
    }

    /// 设置每页条目数（最小为 1）
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains(['/', '\\']) {
            return Err(StoreError::Backend(format!("invalid bucket name {bucket:?}")));
        }
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!("bucket {bucket}")));
        }
        Ok(dir)
    }

    /// 收集 bucket 下所有符合前缀的 key（已排序）
    fn collect_keys(&self, dir: &Path, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1) {
            let entry = entry.map_err(|e| StoreError::Io(io::Error::from(e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = match entry.path().strip_prefix(dir) {
                Ok(r) => r,
                Err(_) => continue,
            };
            match key_from_relative(rel) {
                Some(key) if key.starts_with(prefix) => keys.push(key),
                Some(_) => {}
                None => debug!(path = %entry.path().display(), "skipping non UTF-8 path"),
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// 取本轮列举的 key 快照；首页或 bucket/前缀变化时重新遍历
    fn listing(&self, bucket: &str, prefix: &str, continuation: Option<&str>) -> Result<Arc<Vec<String>>, StoreError> {
        let dir = self.bucket_dir(bucket)?;
        let mut guard = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snap) = guard.as_ref() {
            if continuation.is_some() && snap.bucket == bucket && snap.prefix == prefix {
                return Ok(Arc::clone(&snap.keys));
            }
        }
        let keys = Arc::new(self.collect_keys(&dir, prefix)?);
        debug!(bucket, prefix, keys = keys.len(), "walked bucket directory");
        *guard = Some(Snapshot { bucket: bucket.to_string(), prefix: prefix.to_string(), keys: Arc::clone(&keys) });
        Ok(keys)
    }
}

/// 相对路径转为 `/` 分隔的 key；含非 UTF-8 片段时返回 None
fn key_from_relative(rel: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for c in rel.components() {
        match c {
            Component::Normal(s) => parts.push(s.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

impl ObjectStore for LocalStore {
    fn list_page(&self, bucket: &str, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
        let keys = self.listing(bucket, prefix, continuation)?;

        let start = match continuation {
            Some(after) => keys.partition_point(|k| k.as_str() <= after),
            None => 0,
        };
        let end = (start + self.page_size).min(keys.len());
        let page: Vec<String> = keys[start..end].to_vec();
        let next = if end < keys.len() { page.last().cloned() } else { None };

        Ok(ListPage { entries: page.into_iter().map(ListEntry::new).collect(), next })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let dir = self.bucket_dir(bucket)?;
        let mut path = dir;
        for part in key.split('/') {
            match part {
                "" | "." => continue,
                ".." => return Err(StoreError::PermissionDenied(format!("key {key} escapes bucket"))),
                p => path.push(p),
            }
        }
        match File::open(&path) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(StoreError::PermissionDenied(key.to_string())),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
