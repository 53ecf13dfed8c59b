//! 持久化错误类型

use std::path::{Path, PathBuf};
use thiserror::Error;

/// 持久化层错误
#[derive(Debug, Error)]
pub enum PersistError {
    /// 文件读写失败
    #[error("文件读写失败 {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 序列化失败
    #[error("序列化失败 {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// 文件内容无法解析
    #[error("文件内容损坏 {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl PersistError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// 是否为内容损坏（可回退到默认值）
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    /// 出错的文件路径
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Serialize { path, .. } | Self::Corrupt { path, .. } => {
                path
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
