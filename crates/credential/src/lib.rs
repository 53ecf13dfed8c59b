//! 凭证池管理 crate
//!
//! 提供凭证列表、配额账本和轮询选择功能。
//!
//! ## 模块结构
//!
//! - `pool` - 持有凭证列表、账本和游标的共享状态对象（唯一的锁在这里）
//! - `store` - 凭证列表的加载、规范化和替换
//! - `ledger` - 配额账本：用量记录、拉黑、窗口过期重置、重新映射
//! - `rotator` - 轮询选择下一个可用凭证
//! - `types` - 配额记录等类型定义

mod error;
mod ledger;
mod pool;
mod rotator;
mod store;
mod types;

// 重新导出
pub use error::PoolError;
pub use ledger::{load_ledger, LedgerFile, LedgerState, ResetSummary};
pub use pool::{CredentialPool, PoolFiles};
pub use store::{load_credentials, normalize_credentials, DEFAULT_CREDENTIALS};
pub use types::{mask_credential, CredentialStatus, QuotaRecord, POISON_SENTINEL};
