//! 搜索主流程与并发调度
//!
//! 单生产者（`KeyEnumerator`）/ 多消费者：N 个 worker 在专用 rayon 线程池中竞争同一个 key 通道，
//! 每个 key 依次执行 读取 → 匹配 → 落盘。单个 key 的任何失败只记录日志并跳过；
//! 唯一的致命错误是列举失败。
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel as channel;
use tracing::{debug, debug_span, warn};

use crate::enumerate::KeyEnumerator;
use crate::error::{KeyError, SearchError};
use crate::fetch::fetch_into;
use crate::options::{SearchOptions, SearchStats};
use crate::output::{output_path, persist};
use crate::pattern::TargetPattern;
use crate::store::ObjectStore;

/// 一次搜索的完整配置，构建流水线时一次性传入
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub bucket: String,
    pub prefix: String,
    pub pattern: TargetPattern,
    pub options: SearchOptions,
}

impl SearchConfig {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>, pattern: TargetPattern) -> Self {
        Self { bucket: bucket.into(), prefix: prefix.into(), pattern, options: SearchOptions::default() }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }
}

pub struct SearchPipeline<S: ?Sized> {
    store: Arc<S>,
    config: SearchConfig,
}

impl<S> SearchPipeline<S>
where
    S: ObjectStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    /// 运行直到所有 worker 都观察到 key 序列结束
    ///
    /// 返回各 worker 统计之和；列举失败时返回 `SearchError::Listing`（已在处理中的 key 仍会完成）。
    pub fn run(&self) -> Result<SearchStats, SearchError> {
        let cfg = &self.config;
        let workers = cfg.options.concurrency;
        if workers == 0 {
            return Err(SearchError::InvalidConcurrency(workers));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("search-worker-{i}"))
            .build()?;

        debug!(bucket = %cfg.bucket, prefix = %cfg.prefix, workers, "starting workers");
        let enumerator =
            KeyEnumerator::start(Arc::clone(&self.store), cfg.bucket.clone(), cfg.prefix.clone(), cfg.options.channel_capacity)
                .map_err(SearchError::Spawn)?;

        // worker → 主线程 回传统计
        let (stats_tx, stats_rx) = channel::unbounded::<SearchStats>();
        pool.scope(|s| {
            for id in 0..workers {
                let stats_tx = stats_tx.clone();
                let enumerator = &enumerator;
                s.spawn(move |_| {
                    let stats = self.worker(id, enumerator);
                    let _ = stats_tx.send(stats);
                });
            }
        });
        drop(stats_tx);

        let mut stats = SearchStats::default();
        for w in stats_rx.iter() {
            stats.merge(&w);
        }

        match enumerator.finish() {
            Ok(enumeration) => {
                debug!(pages = enumeration.pages, keys = enumeration.keys, skipped = enumeration.skipped, "workers drained");
                Ok(stats)
            }
            Err(err) => {
                warn!(scanned = stats.objects_scanned, matches = stats.matches_written, "search aborted");
                Err(err)
            }
        }
    }

    /// 单个 worker：循环领取 key，直到通道关闭并排空，或列举中止
    fn worker(&self, id: usize, enumerator: &KeyEnumerator) -> SearchStats {
        let _span = debug_span!("worker", id).entered();
        let mut stats = SearchStats::default();
        // 每个 worker 独占一个缓冲区，key 之间只清空不重新分配
        let mut buf: Vec<u8> = Vec::new();

        for key in enumerator.keys().iter() {
            if enumerator.is_aborted() {
                debug!(key = %key, "listing aborted, dropping key");
                break;
            }
            stats.keys_received += 1;
            match self.search_key(&key, &mut buf, &mut stats) {
                Ok(Some(path)) => {
                    stats.matches_written += 1;
                    debug!(key = %key, path = %path.display(), "match written");
                }
                Ok(None) => {}
                Err(err) => skip(&mut stats, &err),
            }
        }
        stats
    }

    /// 读取 → 匹配 → 落盘；命中时返回输出路径
    fn search_key(&self, key: &str, buf: &mut Vec<u8>, stats: &mut SearchStats) -> Result<Option<PathBuf>, KeyError> {
        let cfg = &self.config;
        fetch_into(&*self.store, &cfg.bucket, key, buf, cfg.options.max_object_size)?;
        stats.objects_scanned += 1;
        stats.bytes_scanned += buf.len() as u64;

        if !cfg.pattern.is_match(buf) {
            return Ok(None);
        }
        let path = output_path(&cfg.options.output_dir, key, cfg.options.layout)?;
        persist(&path, buf)?;
        Ok(Some(path))
    }
}

/// 记录可恢复失败并计数
fn skip(stats: &mut SearchStats, err: &KeyError) {
    match err {
        KeyError::Fetch { .. } => stats.fetch_failures += 1,
        KeyError::Read { .. } => stats.read_failures += 1,
        KeyError::TooLarge { .. } => stats.skipped_too_large += 1,
        KeyError::InvalidName { .. } => stats.invalid_names += 1,
        KeyError::Create { .. } | KeyError::Write { .. } => stats.write_failures += 1,
    }
    warn!(error = %err, "skipping key");
}
