//! 目标模式：字面量字节子串匹配（非正则）
use aho_corasick::AhoCorasick;

use crate::error::PatternError;

/// 本次运行固定的目标字节序列
///
/// 构建后只读，所有 worker 通过共享引用使用，无需同步也无需按次拷贝。
/// 匹配区分大小写、逐字节精确比较；空模式匹配任意内容。
#[derive(Debug, Clone)]
pub struct TargetPattern {
    bytes: Vec<u8>,
    ac: AhoCorasick,
}

impl TargetPattern {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, PatternError> {
        let bytes = bytes.into();
        let ac = AhoCorasick::new([bytes.as_slice()])?;
        Ok(Self { bytes, ac })
    }

    /// `haystack` 中是否包含完整连续的目标序列
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.ac.is_match(haystack)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
