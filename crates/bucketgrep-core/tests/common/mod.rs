//! 测试用内存存储：支持分页、列举失败、读取失败注入，并统计并发读取数
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bucketgrep_core::{ListEntry, ListPage, ObjectStore, StoreError};

#[derive(Default)]
pub struct MockStore {
    objects: BTreeMap<String, Vec<u8>>,
    page_size: usize,
    /// 该下标的列举页返回错误
    fail_page: Option<usize>,
    /// 失败页先等到至少一个对象被读取再报错
    fail_after_fetch: bool,
    fail_fetch: HashSet<String>,
    fail_read: HashSet<String>,
    /// 每页开头插入一个缺少 key 的条目
    holes: bool,
    delay: Duration,
    gauge: Arc<Gauge>,
    pub fetched: Mutex<Vec<String>>,
}

#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

impl MockStore {
    pub fn new<K: Into<String>, V: Into<Vec<u8>>>(objects: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            objects: objects.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            page_size: 1000,
            ..Default::default()
        }
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n;
        self
    }

    pub fn fail_page(mut self, idx: usize) -> Self {
        self.fail_page = Some(idx);
        self
    }

    /// 第 `idx` 页在某个 worker 开始读取对象之后才失败
    pub fn fail_page_after_fetch(mut self, idx: usize) -> Self {
        self.fail_page = Some(idx);
        self.fail_after_fetch = true;
        self
    }

    pub fn fail_fetch(mut self, key: &str) -> Self {
        self.fail_fetch.insert(key.to_string());
        self
    }

    pub fn fail_read(mut self, key: &str) -> Self {
        self.fail_read.insert(key.to_string());
        self
    }

    pub fn with_holes(mut self) -> Self {
        self.holes = true;
        self
    }

    pub fn delay(mut self, d: Duration) -> Self {
        self.delay = d;
        self
    }

    pub fn gauge(&self) -> Arc<Gauge> {
        Arc::clone(&self.gauge)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl ObjectStore for MockStore {
    fn list_page(&self, _bucket: &str, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
        let idx: usize = continuation.map(|t| t.parse().unwrap()).unwrap_or(0);
        if self.fail_page == Some(idx) {
            if self.fail_after_fetch {
                for _ in 0..200 {
                    if !self.fetched.lock().unwrap().is_empty() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
            return Err(StoreError::Backend(format!("page {idx} unavailable")));
        }
        let keys: Vec<&String> = self.objects.keys().filter(|k| k.starts_with(prefix)).collect();
        let start = idx * self.page_size;
        let end = (start + self.page_size).min(keys.len());
        let mut entries = Vec::new();
        if self.holes {
            entries.push(ListEntry { key: None });
        }
        entries.extend(keys[start.min(end)..end].iter().map(|k| ListEntry::new(k.as_str())));
        let next = if end < keys.len() { Some((idx + 1).to_string()) } else { None };
        Ok(ListPage { entries, next })
    }

    fn get_object(&self, _bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        self.fetched.lock().unwrap().push(key.to_string());
        let now = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.max.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        if self.fail_fetch.contains(key) {
            self.gauge.current.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::PermissionDenied(key.to_string()));
        }
        let Some(content) = self.objects.get(key) else {
            self.gauge.current.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::NotFound(key.to_string()));
        };
        Ok(Box::new(Tracked {
            inner: Cursor::new(content.clone()),
            fail: self.fail_read.contains(key),
            gauge: Arc::clone(&self.gauge),
        }))
    }
}

/// 内容流：丢弃时并发计数减一；`fail` 时读到一半报错
struct Tracked {
    inner: Cursor<Vec<u8>>,
    fail: bool,
    gauge: Arc<Gauge>,
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail && self.inner.position() > 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "stream cut"));
        }
        let n = buf.len().min(2);
        self.inner.read(&mut buf[..n])
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 输出目录下所有文件名（排序）
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
