//! 凭证池
//!
//! 凭证列表、配额账本和轮询游标都放在同一个 `CredentialPool` 对象里，
//! 由一把锁保护。锁只在内存修改和同步落盘期间持有，不跨越任何网络请求。
//! 内部辅助函数直接接收已加锁的状态，不会重复加锁。

use aiverse_core::{atomic_write_json, PersistError};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::info;

use crate::error::PoolError;
use crate::ledger::{load_ledger, LedgerState};
use crate::store::load_credentials;
use crate::types::QuotaRecord;

/// 凭证池使用的持久化文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolFiles {
    /// 凭证列表文件（`keys.json`）
    pub credentials: PathBuf,
    /// 账本文件（`key_state.json`）
    pub ledger: PathBuf,
}

impl PoolFiles {
    pub fn new(credentials: impl Into<PathBuf>, ledger: impl Into<PathBuf>) -> Self {
        Self {
            credentials: credentials.into(),
            ledger: ledger.into(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PoolState {
    pub(crate) credentials: Vec<String>,
    pub(crate) ledger: LedgerState,
}

/// 凭证池
pub struct CredentialPool {
    pub(crate) files: PoolFiles,
    pub(crate) char_limit: u64,
    pub(crate) state: Mutex<PoolState>,
}

impl CredentialPool {
    /// 创建空凭证池（不读取磁盘）
    pub fn new(files: PoolFiles, char_limit: u64) -> Self {
        Self::from_parts(files, char_limit, Vec::new(), LedgerState::default())
    }

    /// 使用给定的内存状态创建凭证池
    pub fn from_parts(
        files: PoolFiles,
        char_limit: u64,
        credentials: Vec<String>,
        ledger: LedgerState,
    ) -> Self {
        Self {
            files,
            char_limit,
            state: Mutex::new(PoolState {
                credentials,
                ledger,
            }),
        }
    }

    /// 创建并从磁盘加载凭证池
    ///
    /// 返回加载过程中被恢复的错误（文件损坏等），这些错误不会阻止凭证池使用。
    pub fn open(files: PoolFiles, char_limit: u64) -> (Self, Vec<PersistError>) {
        let pool = Self::new(files, char_limit);
        let warnings = pool.reload();
        (pool, warnings)
    }

    /// 从磁盘重新加载凭证列表和账本
    ///
    /// 内存中的游标保留，下一次选择从上次停下的位置继续。
    pub fn reload(&self) -> Vec<PersistError> {
        let mut state = self.state.lock();

        let credentials = load_credentials(&self.files.credentials);
        let ledger = load_ledger(&self.files.ledger);
        let warnings: Vec<PersistError> = credentials
            .warning
            .into_iter()
            .chain(ledger.warning)
            .collect();

        let cursor = state.ledger.cursor();
        state.credentials = credentials.value;
        state.ledger = ledger.value;
        state.ledger.set_cursor(cursor);

        info!(
            "[凭证池] 已加载 {} 个凭证，{} 条账本记录",
            state.credentials.len(),
            state.ledger.records().len()
        );
        warnings
    }

    pub fn files(&self) -> &PoolFiles {
        &self.files
    }

    pub fn char_limit(&self) -> u64 {
        self.char_limit
    }

    /// 当前凭证列表（按轮询顺序）
    pub fn credentials(&self) -> Vec<String> {
        self.state.lock().credentials.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().credentials.is_empty()
    }

    /// 单个凭证的配额记录
    pub fn record(&self, credential: &str) -> Option<QuotaRecord> {
        self.state.lock().ledger.record(credential).cloned()
    }

    /// 凭证列表及其配额记录（没有记录的凭证视为从未使用）
    pub fn usage(&self) -> Vec<(String, QuotaRecord)> {
        let state = self.state.lock();
        state
            .credentials
            .iter()
            .map(|credential| {
                let record = state.ledger.record(credential).cloned().unwrap_or_default();
                (credential.clone(), record)
            })
            .collect()
    }

    pub fn ledger_snapshot(&self) -> LedgerState {
        self.state.lock().ledger.clone()
    }

    /// 强制写入账本
    pub fn persist(&self) -> Result<(), PoolError> {
        let state = self.state.lock();
        self.write_ledger(&state.ledger)?;
        Ok(())
    }

    pub(crate) fn write_ledger(&self, ledger: &LedgerState) -> Result<(), PersistError> {
        atomic_write_json(&self.files.ledger, &ledger.to_file())
    }

    pub(crate) fn write_credentials(&self, credentials: &[String]) -> Result<(), PersistError> {
        atomic_write_json(&self.files.credentials, credentials)
    }
}
