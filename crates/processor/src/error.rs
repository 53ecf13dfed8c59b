//! 错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 音频文件写入错误
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("无法创建输出目录 {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法写入音频文件 {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 任务启动/运行错误
#[derive(Debug, Error)]
pub enum JobError {
    /// 同一引擎上已有任务在运行
    #[error("已有转换任务正在运行")]
    AlreadyRunning,

    /// 后台任务异常退出
    #[error("转换任务异常退出: {0}")]
    Worker(String),
}
