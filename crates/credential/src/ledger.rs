//! 配额账本
//!
//! 记录每个凭证在当前配额窗口内的用量、首次使用时间和失效标记。
//!
//! `LedgerState` 上的操作都是纯内存操作，便于单独测试；
//! `CredentialPool` 上的同名方法负责加锁和落盘。

use aiverse_core::{backup_file, read_json, LoadOutcome};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

use crate::error::PoolError;
use crate::pool::CredentialPool;
use crate::types::{mask_credential, QuotaRecord, POISON_SENTINEL};

/// 账本文件格式（`key_state.json`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFile {
    #[serde(default)]
    pub chunks_used: BTreeMap<String, u64>,
    #[serde(default)]
    pub chars_used: BTreeMap<String, u64>,
    /// ISO-8601 时间戳；无时区的按 UTC 处理
    #[serde(default)]
    pub first_used: BTreeMap<String, String>,
    #[serde(default)]
    pub invalid: Vec<String>,
}

/// 过期重置的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetSummary {
    /// 窗口到期、计数已清零的凭证
    pub reset: Vec<String>,
    /// 用量已达上限、被补标为失效的凭证
    pub repaired: Vec<String>,
}

impl ResetSummary {
    pub fn changed(&self) -> bool {
        !self.reset.is_empty() || !self.repaired.is_empty()
    }
}

/// 账本状态：凭证 -> 配额记录，外加轮询游标
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    records: HashMap<String, QuotaRecord>,
    cursor: usize,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, credential: &str) -> Option<&QuotaRecord> {
        self.records.get(credential)
    }

    pub fn records(&self) -> &HashMap<String, QuotaRecord> {
        &self.records
    }

    pub fn insert(&mut self, credential: impl Into<String>, record: QuotaRecord) {
        self.records.insert(credential.into(), record);
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    pub(crate) fn record_mut(&mut self, credential: &str) -> &mut QuotaRecord {
        self.records.entry(credential.to_string()).or_default()
    }

    /// 记录一次成功发送
    ///
    /// 发送前不做上限检查，允许少量超额；超额在下一次选择时才会生效。
    pub fn record_usage(
        &mut self,
        credential: &str,
        char_count: u64,
        now: DateTime<Utc>,
        char_limit: u64,
    ) -> QuotaRecord {
        let record = self.record_mut(credential);
        if record.first_used_at.is_none() {
            record.first_used_at = Some(now);
        }
        record.chunks_used += 1;
        record.chars_used += char_count;
        if record.chars_used >= char_limit {
            record.invalid = true;
        }
        record.clone()
    }

    /// 拉黑被服务端拒绝的凭证
    pub fn poison(&mut self, credential: &str) {
        let record = self.record_mut(credential);
        record.invalid = true;
        record.chunks_used = POISON_SENTINEL;
        record.chars_used = POISON_SENTINEL;
    }

    /// 重置窗口已到期的凭证，并补标用量已达上限的凭证
    ///
    /// `before_first_reset` 在第一次清零之前调用一次（用于备份账本文件）。
    /// 到期的凭证连同失效标记一起清除，包括因 401/403 被拉黑的凭证。
    pub fn reset_expired<F: FnMut()>(
        &mut self,
        now: DateTime<Utc>,
        window: chrono::Duration,
        char_limit: u64,
        mut before_first_reset: F,
    ) -> ResetSummary {
        let mut summary = ResetSummary::default();

        let mut expired: Vec<String> = self
            .records
            .iter()
            .filter(|(_, record)| {
                record
                    .first_used_at
                    .is_some_and(|first| now.signed_duration_since(first) >= window)
            })
            .map(|(credential, _)| credential.clone())
            .collect();
        expired.sort();

        if !expired.is_empty() {
            before_first_reset();
        }
        for credential in expired {
            if let Some(record) = self.records.get_mut(&credential) {
                *record = QuotaRecord::default();
            }
            summary.reset.push(credential);
        }

        for (credential, record) in self.records.iter_mut() {
            if record.chars_used >= char_limit && !record.invalid {
                record.invalid = true;
                summary.repaired.push(credential.clone());
            }
        }
        summary.repaired.sort();

        summary
    }

    /// 按新的凭证列表重新映射账本
    ///
    /// 保留仍在列表中的凭证记录，丢弃已移除的凭证，新增凭证使用空记录，游标归零。
    /// 结果只取决于新列表中出现的凭证集合，与顺序无关。
    pub fn rekey(&self, credentials: &[String]) -> LedgerState {
        let records = credentials
            .iter()
            .map(|credential| {
                let record = self.records.get(credential).cloned().unwrap_or_default();
                (credential.clone(), record)
            })
            .collect();

        LedgerState { records, cursor: 0 }
    }

    /// 转换为账本文件格式（游标不持久化）
    pub fn to_file(&self) -> LedgerFile {
        let mut file = LedgerFile::default();
        let mut invalid = BTreeSet::new();

        for (credential, record) in &self.records {
            file.chunks_used.insert(credential.clone(), record.chunks_used);
            file.chars_used.insert(credential.clone(), record.chars_used);
            if let Some(first) = record.first_used_at {
                file.first_used.insert(
                    credential.clone(),
                    first.to_rfc3339_opts(SecondsFormat::AutoSi, false),
                );
            }
            if record.invalid {
                invalid.insert(credential.clone());
            }
        }

        file.invalid = invalid.into_iter().collect();
        file
    }

    /// 从账本文件恢复状态
    ///
    /// 返回无法解析的时间戳对应的凭证（这些时间戳被丢弃）。
    pub fn from_file(file: LedgerFile) -> (Self, Vec<String>) {
        let mut state = LedgerState::default();
        let mut dropped = Vec::new();

        for (credential, count) in file.chunks_used {
            state.record_mut(&credential).chunks_used = count;
        }
        for (credential, count) in file.chars_used {
            state.record_mut(&credential).chars_used = count;
        }
        for (credential, raw) in file.first_used {
            match parse_timestamp(&raw) {
                Some(first) => state.record_mut(&credential).first_used_at = Some(first),
                None => dropped.push(credential),
            }
        }
        for credential in file.invalid {
            state.record_mut(&credential).invalid = true;
        }

        (state, dropped)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// 加载账本文件
///
/// 文件不存在时返回空账本；内容损坏时回退为空账本并附带警告。
pub fn load_ledger(path: &Path) -> LoadOutcome<LedgerState> {
    match read_json::<LedgerFile>(path) {
        Ok(Some(file)) => {
            let (state, dropped) = LedgerState::from_file(file);
            for credential in dropped {
                warn!(
                    "[账本] 凭证 {} 的首次使用时间无法解析，已忽略",
                    mask_credential(&credential)
                );
            }
            LoadOutcome::clean(state)
        }
        Ok(None) => LoadOutcome::clean(LedgerState::default()),
        Err(e) => {
            warn!("[账本] 无法加载账本，从空状态开始: {}", e);
            LoadOutcome::recovered(LedgerState::default(), e)
        }
    }
}

impl CredentialPool {
    /// 记录一次成功发送并立即落盘
    pub fn record_usage(&self, credential: &str, char_count: u64) -> Result<QuotaRecord, PoolError> {
        self.record_usage_at(credential, char_count, Utc::now())
    }

    pub fn record_usage_at(
        &self,
        credential: &str,
        char_count: u64,
        now: DateTime<Utc>,
    ) -> Result<QuotaRecord, PoolError> {
        let mut state = self.state.lock();
        let record = state
            .ledger
            .record_usage(credential, char_count, now, self.char_limit);

        if record.invalid {
            info!(
                "[账本] 凭证 {} 已用 {} 字符，达到上限 {}",
                mask_credential(credential),
                record.chars_used,
                self.char_limit
            );
        }

        self.write_ledger(&state.ledger)?;
        Ok(record)
    }

    /// 拉黑凭证并立即落盘
    pub fn poison(&self, credential: &str) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        state.ledger.poison(credential);
        warn!("[账本] 凭证 {} 被服务端拒绝，已标记失效", mask_credential(credential));
        self.write_ledger(&state.ledger)?;
        Ok(())
    }

    /// 重置窗口已到期的凭证，仅在有变更时落盘
    pub fn reset_expired(
        &self,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Result<ResetSummary, PoolError> {
        let mut state = self.state.lock();
        let ledger_path = self.files.ledger.as_path();
        let summary = state
            .ledger
            .reset_expired(now, window, self.char_limit, || {
                backup_file(ledger_path, now);
            });

        if summary.changed() {
            info!(
                "[账本] 窗口到期重置 {} 个凭证，补标失效 {} 个",
                summary.reset.len(),
                summary.repaired.len()
            );
            self.write_ledger(&state.ledger)?;
        }

        Ok(summary)
    }
}
