//! 音频输出
//!
//! 每个分块写成 `{base}_{n}.{ext}`；目标已存在时依次尝试 `{base}_{n}_1.{ext}`、
//! `{base}_{n}_2.{ext}`……，不覆盖任何已有文件。

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use voice_core::AudioPayload;

use crate::error::OutputError;

/// 第 `n` 次尝试的候选路径，`n == 0` 为原始路径
fn candidate(desired: &Path, n: u32) -> PathBuf {
    if n == 0 {
        return desired.to_path_buf();
    }
    let stem = desired
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match desired.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    desired.with_file_name(name)
}

/// 分块音频的目标文件名（序号从 1 开始）
pub fn chunk_file_name(base: &str, index: usize, payload: &AudioPayload) -> String {
    format!("{}_{}.{}", base, index, payload.format.extension())
}

/// 写入一个分块的音频，返回实际写入的路径
///
/// 以独占创建方式打开文件，并发写入同名文件时也不会互相覆盖。
pub fn write_audio(
    dir: &Path,
    base: &str,
    index: usize,
    payload: &AudioPayload,
) -> Result<PathBuf, OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let desired = dir.join(chunk_file_name(base, index, payload));
    let mut n = 0;
    loop {
        let path = candidate(&desired, n);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let written = file
                    .write_all(&payload.bytes)
                    .and_then(|_| file.sync_all());
                if let Err(source) = written {
                    drop(file);
                    let _ = fs::remove_file(&path);
                    return Err(OutputError::Write { path, source });
                }
                tracing::info!("[输出] 音频已保存: {}", path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(source) => return Err(OutputError::Write { path, source }),
        }
    }
}
