//! 凭证池错误类型

use aiverse_core::PersistError;
use thiserror::Error;

/// 凭证池错误
#[derive(Debug, Error)]
pub enum PoolError {
    /// 替换后的凭证列表为空，原列表保持不变
    #[error("凭证列表不能为空")]
    EmptyPool,

    /// 没有任何可用凭证（全部失效或超出配额）
    #[error("没有可用的凭证：所有凭证均已失效或超出配额")]
    ExhaustedPool,

    /// 持久化失败（内存状态已更新）
    #[error("凭证状态持久化失败: {0}")]
    Persistence(#[from] PersistError),
}
