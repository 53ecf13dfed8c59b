//! 持久化层
//!
//! 所有持久化文件都是 UTF-8 JSON，写入统一走原子协议：
//! 先写入同目录下的临时文件并 fsync，再 rename 覆盖目标文件。
//! 读取方永远不会看到写了一半的文件；写入失败时临时文件会被删除，原文件保持不变。

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{PersistError, Result};

/// 带恢复信息的加载结果
///
/// 文件损坏时 `value` 为回退后的默认值，`warning` 记录原始错误，由调用方决定如何提示。
#[derive(Debug)]
pub struct LoadOutcome<T> {
    pub value: T,
    pub warning: Option<PersistError>,
}

impl<T> LoadOutcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn recovered(value: T, warning: PersistError) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }
}

/// 原子写入字节内容
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    // NamedTempFile 在 drop 时会删除自身，任何一步出错都不会留下临时文件
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| PersistError::io(path, e))?;

    tmp.write_all(bytes).map_err(|e| PersistError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PersistError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| PersistError::io(path, e.error))?;

    debug!("[持久化] 已写入 {} ({} 字节)", path.display(), bytes.len());
    Ok(())
}

/// 原子写入 JSON（两空格缩进）
pub fn atomic_write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, &bytes)
}

/// 读取 JSON 文件
///
/// 文件不存在时返回 `Ok(None)`；内容不是合法 UTF-8 或无法解析时返回 `PersistError::Corrupt`。
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(PersistError::corrupt(path, e.to_string()))
        }
        Err(e) => return Err(PersistError::io(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| PersistError::corrupt(path, e.to_string()))
}

/// 为文件生成带时间戳的快照副本（尽力而为）
///
/// 快照路径为 `<file>.bak.<YYYYmmddTHHMMSSZ>`，源文件不存在或复制失败时返回 `None`。
pub fn backup_file(path: &Path, now: DateTime<Utc>) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }

    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let stamp = now.format("%Y%m%dT%H%M%SZ");
    let backup = path.with_file_name(format!("{file_name}.bak.{stamp}"));

    match fs::copy(path, &backup) {
        Ok(_) => {
            debug!("[持久化] 已备份 {} -> {}", path.display(), backup.display());
            Some(backup)
        }
        Err(e) => {
            warn!("[持久化] 备份 {} 失败: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn list_dir(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        atomic_write_json(&path, &vec!["a", "b"]).unwrap();
        let loaded: Option<Vec<String>> = read_json(&path).unwrap();

        assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(list_dir(dir.path()), vec!["keys.json"]);
    }

    #[test]
    fn test_output_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut map = BTreeMap::new();
        map.insert("char_limit", 7500);

        atomic_write_json(&path, &map).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "{\n  \"char_limit\": 7500\n}");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<Vec<String>> = read_json(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_read_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, "[\"unterminated").unwrap();

        let err = read_json::<Vec<String>>(&path).unwrap_err();
        assert!(err.is_corrupt());
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn test_read_invalid_utf8_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert!(read_json::<Vec<String>>(&path).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_stray_temp_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        atomic_write_json(&path, &vec!["committed"]).unwrap();

        // 模拟 rename 之前崩溃留下的半截临时文件
        fs::write(dir.path().join(".keys.json.XXXXXX.tmp"), "[\"half").unwrap();

        let loaded: Option<Vec<String>> = read_json(&path).unwrap();
        assert_eq!(loaded, Some(vec!["committed".to_string()]));
    }

    #[test]
    fn test_failed_rename_keeps_previous_and_cleans_temp() {
        let dir = tempfile::tempdir().unwrap();
        // 目标是非空目录，rename 必然失败
        let target = dir.path().join("key_state.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), "keep").unwrap();

        let err = atomic_write_json(&target, &vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, PersistError::Io { .. }));

        assert_eq!(list_dir(dir.path()), vec!["key_state.json"]);
        assert_eq!(fs::read_to_string(target.join("inner")).unwrap(), "keep");
    }

    #[test]
    fn test_missing_parent_dir_fails_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("keys.json");

        assert!(atomic_write_json(&path, &vec!["a"]).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");

        atomic_write_json(&path, &vec!["old"]).unwrap();
        atomic_write_json(&path, &vec!["new"]).unwrap();

        let loaded: Option<Vec<String>> = read_json(&path).unwrap();
        assert_eq!(loaded, Some(vec!["new".to_string()]));
    }

    #[test]
    fn test_backup_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key_state.json");
        fs::write(&path, "{}").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();

        let backup = backup_file(&path, now).unwrap();

        assert_eq!(
            backup.file_name().unwrap().to_string_lossy(),
            "key_state.json.bak.20240305T070809Z"
        );
        assert_eq!(fs::read_to_string(backup).unwrap(), "{}");
    }

    #[test]
    fn test_backup_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(backup_file(&dir.path().join("missing.json"), Utc::now()).is_none());
    }
}
