//! S3 后端（aws-sdk-s3）
//!
//! SDK 为异步接口，这里持有一个私有 tokio 运行时，通过 `block_on` 适配为阻塞的 `ObjectStore`。
//! 凭证来自 SDK 默认链（环境变量 → 共享配置/profile → 实例元数据）。
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::runtime::Runtime;
use tracing::debug;

use super::{ListEntry, ListPage, ObjectStore};
use crate::error::StoreError;

pub const DEFAULT_REGION: &str = "eu-west-1";

/// S3 连接配置
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    /// 自定义 endpoint（MinIO / LocalStack 等），设置时启用 path-style 访问
    pub endpoint: Option<String>,
    pub profile: Option<String>,
    /// 单次 SDK 操作超时；默认不设置，卡住的请求会一直阻塞
    pub operation_timeout: Option<Duration>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self { region: DEFAULT_REGION.to_string(), endpoint: None, profile: None, operation_timeout: None }
    }
}

pub struct S3Store {
    client: Client,
    runtime: Arc<Runtime>,
}

impl S3Store {
    pub fn connect(config: &S3Config) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        let client = runtime.block_on(create_client(config));
        debug!(region = %config.region, endpoint = ?config.endpoint, "s3 client ready");
        Ok(Self { client, runtime: Arc::new(runtime) })
    }
}

async fn create_client(config: &S3Config) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint.clone());
    }
    if let Some(profile) = &config.profile {
        loader = loader.profile_name(profile.clone());
    }
    if let Some(timeout) = config.operation_timeout {
        loader = loader.timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
    }
    let shared = loader.load().await;

    let builder = aws_sdk_s3::config::Builder::from(&shared);
    let s3_config = if config.endpoint.is_some() { builder.force_path_style(true).build() } else { builder.build() };
    Client::from_conf(s3_config)
}

impl ObjectStore for S3Store {
    fn list_page(&self, bucket: &str, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
        let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if let Some(token) = continuation {
            req = req.continuation_token(token);
        }
        let resp = self
            .runtime
            .block_on(req.send())
            .map_err(|e| StoreError::Backend(DisplayErrorContext(&e).to_string()))?;

        let entries = resp
            .contents
            .unwrap_or_default()
            .into_iter()
            .map(|obj| ListEntry { key: obj.key })
            .collect();
        // is_truncated 但缺少续传标记时按最后一页处理
        let next = if resp.is_truncated == Some(true) { resp.next_continuation_token } else { None };
        Ok(ListPage { entries, next })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>, StoreError> {
        let out = self
            .runtime
            .block_on(self.client.get_object().bucket(bucket).key(key).send())
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()).unwrap_or(false) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(DisplayErrorContext(&e).to_string())
                }
            })?;
        Ok(Box::new(S3Body { runtime: Arc::clone(&self.runtime), body: out.body, chunk: Bytes::new() }))
    }
}

/// 把 ByteStream 逐块转换为阻塞 `Read`
struct S3Body {
    runtime: Arc<Runtime>,
    body: ByteStream,
    chunk: Bytes,
}

impl Read for S3Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.chunk.is_empty() {
            match self.runtime.block_on(self.body.try_next()) {
                Ok(Some(bytes)) => self.chunk = bytes,
                Ok(None) => return Ok(0),
                Err(e) => return Err(io::Error::other(e)),
            }
        }
        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk.split_to(n));
        Ok(n)
    }
}
