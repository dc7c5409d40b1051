//! 命中结果落盘
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::KeyError;
use crate::options::OutputLayout;

/// 计算 key 对应的输出路径
///
/// Flat 取最后一段（先去掉末尾 `/`），例如 `a/b/c.txt` → `c.txt`；
/// Nested 保留完整相对路径，拒绝 `..`。
pub fn output_path(dir: &Path, key: &str, layout: OutputLayout) -> Result<PathBuf, KeyError> {
    let invalid = || KeyError::InvalidName { key: key.to_string() };
    match layout {
        OutputLayout::Flat => {
            let name = key.trim_end_matches('/').rsplit('/').next().unwrap_or("");
            if matches!(name, "" | "." | "..") {
                return Err(invalid());
            }
            Ok(dir.join(name))
        }
        OutputLayout::Nested => {
            let mut path = dir.to_path_buf();
            let mut parts = 0;
            for part in key.split('/') {
                match part {
                    "" | "." => continue,
                    ".." => return Err(invalid()),
                    p => {
                        path.push(p);
                        parts += 1;
                    }
                }
            }
            if parts == 0 {
                return Err(invalid());
            }
            Ok(path)
        }
    }
}

/// 创建（截断）文件并写入完整内容；文件句柄在返回前关闭
///
/// 写入失败时删除已截断的普通文件，不留下内容不完整的输出。
pub fn persist(path: &Path, content: &[u8]) -> Result<(), KeyError> {
    let create_err = |source| KeyError::Create { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(create_err)?;
    }
    let f = File::create(path).map_err(create_err)?;
    write_or_discard(path, f, content)
}

fn write_or_discard<W: Write>(path: &Path, mut out: W, content: &[u8]) -> Result<(), KeyError> {
    let res = out.write_all(content).and_then(|()| out.flush());
    drop(out);
    let Err(source) = res else {
        return Ok(());
    };
    // 设备文件等非普通文件保持原样
    if fs::metadata(path).map(|m| m.is_file()).unwrap_or(false) {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove partial output");
        }
    }
    Err(KeyError::Write { path: path.to_path_buf(), source })
}
