//! Key 枚举器：把分页列举转换为单一、惰性、只前进的 key 序列
//!
//! - 独立线程执行列举，每拿到一页立即逐个发送，不会先缓存整个 key 空间
//! - 条目缺少 key 时静默跳过
//! - 正常结束：最后一页发送完毕后丢弃 Sender，通道关闭且只关闭一次
//! - 列举失败：先置位中止标记再关闭通道，worker 不再接收新 key；`finish` 返回 `ListError`
//! - 所有接收方都已退出时 `send` 失败，生产者随即停止而不会永久阻塞
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as channel, Receiver, Sender};
use tracing::{debug, error};

use crate::error::{ListError, SearchError};
use crate::store::ObjectStore;

/// 一次枚举的汇总
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub pages: u64,
    pub keys: u64,
    /// 缺少 key 而被跳过的条目数
    pub skipped: u64,
    /// 接收方全部退出导致提前停止
    pub disconnected: bool,
}

pub struct KeyEnumerator {
    keys: Receiver<String>,
    aborted: Arc<AtomicBool>,
    handle: JoinHandle<Result<Enumeration, ListError>>,
}

impl KeyEnumerator {
    /// 启动生产者线程
    ///
    /// `capacity` 为通道容量；0 为同步交接，生产者在某个 worker 取走 key 前一直等待。
    pub fn start<S>(store: Arc<S>, bucket: impl Into<String>, prefix: impl Into<String>, capacity: usize) -> io::Result<Self>
    where
        S: ObjectStore + ?Sized + 'static,
    {
        let (tx, rx) = channel::bounded::<String>(capacity);
        let aborted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&aborted);
        let bucket = bucket.into();
        let prefix = prefix.into();

        let handle = thread::Builder::new()
            .name("key-enumerator".to_string())
            .spawn(move || produce(&*store, &bucket, &prefix, tx, &flag))?;

        Ok(Self { keys: rx, aborted, handle })
    }

    /// 共享的 key 接收端（可被多个 worker 同时使用）
    pub fn keys(&self) -> &Receiver<String> {
        &self.keys
    }

    /// 列举是否已因失败中止
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// 等待生产者结束
    ///
    /// 先丢弃本地接收端：若此时仍有未取走的 key，生产者的 `send` 会失败并退出。
    pub fn finish(self) -> Result<Enumeration, SearchError> {
        let KeyEnumerator { keys, handle, .. } = self;
        drop(keys);
        match handle.join() {
            Ok(res) => Ok(res?),
            Err(_) => Err(SearchError::EnumeratorPanicked),
        }
    }
}

fn produce<S>(store: &S, bucket: &str, prefix: &str, tx: Sender<String>, aborted: &AtomicBool) -> Result<Enumeration, ListError>
where
    S: ObjectStore + ?Sized,
{
    let mut summary = Enumeration::default();
    let mut token: Option<String> = None;

    loop {
        let page = match store.list_page(bucket, prefix, token.as_deref()) {
            Ok(p) => p,
            Err(source) => {
                error!(bucket, prefix, error = %source, "could not fetch keys");
                aborted.store(true, Ordering::Release);
                // 返回时 tx 被丢弃，通道随之关闭
                return Err(ListError { bucket: bucket.to_string(), prefix: prefix.to_string(), source });
            }
        };
        summary.pages += 1;
        debug!(page = summary.pages, entries = page.entries.len(), last = page.is_last(), "listed page");

        for entry in page.entries {
            let Some(key) = entry.key else {
                summary.skipped += 1;
                continue;
            };
            if tx.send(key).is_err() {
                debug!(keys = summary.keys, "all consumers gone, stopping enumeration");
                summary.disconnected = true;
                return Ok(summary);
            }
            summary.keys += 1;
        }

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!(pages = summary.pages, keys = summary.keys, skipped = summary.skipped, "enumeration complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{ListEntry, ListPage};
    use std::io::Read;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 按页脚本化的存储：续传标记即下一页下标
    struct ScriptedStore {
        pages: Vec<Option<Vec<Option<&'static str>>>>,
        calls: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedStore {
        fn new(pages: Vec<Option<Vec<Option<&'static str>>>>) -> Self {
            Self { pages, calls: Mutex::new(Vec::new()) }
        }
    }

    impl ObjectStore for ScriptedStore {
        fn list_page(&self, _bucket: &str, _prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
            self.calls.lock().unwrap().push(continuation.map(str::to_string));
            let idx: usize = continuation.map(|t| t.parse().unwrap()).unwrap_or(0);
            let entries = match &self.pages[idx] {
                Some(e) => e,
                None => return Err(StoreError::Backend("listing exploded".into())),
            };
            let next = if idx + 1 < self.pages.len() { Some((idx + 1).to_string()) } else { None };
            Ok(ListPage { entries: entries.iter().map(|k| ListEntry { key: k.map(str::to_string) }).collect(), next })
        }

        fn get_object(&self, _bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
            Err(StoreError::NotFound(key.to_string()))
        }
    }

    #[test]
    fn emits_keys_across_pages_and_closes() {
        let store = Arc::new(ScriptedStore::new(vec![
            Some(vec![Some("a"), Some("b")]),
            Some(vec![]),
            Some(vec![Some("c")]),
        ]));
        let e = KeyEnumerator::start(Arc::clone(&store), "bucket", "p/", 0).unwrap();
        let keys: Vec<String> = e.keys().iter().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(!e.is_aborted());

        let summary = e.finish().unwrap();
        assert_eq!(summary, Enumeration { pages: 3, keys: 3, skipped: 0, disconnected: false });
        assert_eq!(*store.calls.lock().unwrap(), vec![None, Some("1".to_string()), Some("2".to_string())]);
    }

    #[test]
    fn skips_entries_without_key() {
        let store = Arc::new(ScriptedStore::new(vec![Some(vec![None, Some("x"), None, Some("y")])]));
        let e = KeyEnumerator::start(store, "bucket", "", 4).unwrap();
        let keys: Vec<String> = e.keys().iter().collect();
        assert_eq!(keys, vec!["x", "y"]);
        let summary = e.finish().unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.keys, 2);
    }

    #[test]
    fn empty_listing_closes_immediately() {
        let store = Arc::new(ScriptedStore::new(vec![Some(vec![])]));
        let e = KeyEnumerator::start(store, "bucket", "nothing/", 0).unwrap();
        assert_eq!(e.keys().iter().count(), 0);
        assert_eq!(e.finish().unwrap().keys, 0);
    }

    #[test]
    fn listing_failure_is_fatal_after_partial_pages() {
        let store = Arc::new(ScriptedStore::new(vec![Some(vec![Some("x.txt")]), None, Some(vec![Some("never")])]));
        let e = KeyEnumerator::start(store, "bucket", "logs/", 0).unwrap();
        let keys: Vec<String> = e.keys().iter().collect();
        assert_eq!(keys, vec!["x.txt"]);
        assert!(e.is_aborted());

        match e.finish() {
            Err(SearchError::Listing(err)) => {
                assert_eq!(err.bucket, "bucket");
                assert_eq!(err.prefix, "logs/");
                assert!(err.to_string().contains("bucket/logs/"));
            }
            other => panic!("expected listing error, got {other:?}"),
        }
    }

    #[test]
    fn stops_when_consumers_are_gone() {
        let pages = (0..50).map(|_| Some(vec![Some("k"); 10])).collect();
        let store = Arc::new(ScriptedStore::new(pages));
        let e = KeyEnumerator::start(Arc::clone(&store), "bucket", "", 0).unwrap();
        assert_eq!(e.keys().recv_timeout(Duration::from_secs(5)).unwrap(), "k");

        let summary = e.finish().unwrap();
        assert!(summary.disconnected);
        assert!(summary.pages < 50);
    }
}
