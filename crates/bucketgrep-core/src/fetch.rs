//! 单个对象的读取：整体读入 worker 复用的缓冲区
use std::io::Read;

use crate::error::KeyError;
use crate::store::ObjectStore;

/// 读取对象全部内容到 `buf`
///
/// - `buf` 先清空（保留容量），失败时同样清空，不保留半截数据
/// - 内容流在返回前释放，无论读取成功与否
/// - `limit` 为单对象字节上限，超过即返回 `TooLarge`
pub fn fetch_into<S>(store: &S, bucket: &str, key: &str, buf: &mut Vec<u8>, limit: Option<u64>) -> Result<(), KeyError>
where
    S: ObjectStore + ?Sized,
{
    buf.clear();
    let mut body = store
        .get_object(bucket, key)
        .map_err(|source| KeyError::Fetch { key: key.to_string(), source })?;

    // 多读 1 字节用于判断是否超限
    let res = match limit {
        Some(limit) => (&mut body).take(limit.saturating_add(1)).read_to_end(buf),
        None => body.read_to_end(buf),
    };
    drop(body);

    if let Err(source) = res {
        buf.clear();
        return Err(KeyError::Read { key: key.to_string(), source });
    }
    if let Some(limit) = limit {
        if buf.len() as u64 > limit {
            buf.clear();
            return Err(KeyError::TooLarge { key: key.to_string(), limit });
        }
    }
    Ok(())
}
