//! 配置文件加载（TOML）
//!
//! 所有字段可选；命令行参数覆盖文件值，文件值覆盖默认值。
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::options::{OutputLayout, SearchOptions};

/// S3 连接相关配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Section {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub profile: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// 顶层配置文件结构
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub pattern: Option<String>,
    pub concurrency: Option<usize>,
    pub channel_capacity: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub layout: Option<OutputLayout>,
    pub max_object_size: Option<u64>,
    /// 设置后使用本地目录后端而不是 S3
    pub local_root: Option<PathBuf>,
    #[serde(default)]
    pub s3: S3Section,
}

impl FileConfig {
    /// 以默认值为底，叠加文件中出现的字段
    pub fn search_options(&self) -> SearchOptions {
        let mut opts = SearchOptions::default();
        if let Some(n) = self.concurrency {
            opts.concurrency = n;
        }
        if let Some(c) = self.channel_capacity {
            opts.channel_capacity = c;
        }
        if let Some(dir) = &self.output_dir {
            opts.output_dir = dir.clone();
        }
        if let Some(layout) = self.layout {
            opts.layout = layout;
        }
        opts.max_object_size = self.max_object_size;
        opts
    }
}

/// 从 TOML 文件加载配置
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let txt = std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    parse_config(&txt).with_context(|| format!("parse config {}", path.display()))
}

pub(crate) fn parse_config(txt: &str) -> Result<FileConfig> {
    Ok(toml::from_str(txt)?)
}
