//! 凭证列表
//!
//! 凭证列表文件（`keys.json`）是一个字符串数组，顺序即轮询顺序。

use aiverse_core::{atomic_write_json, read_json, LoadOutcome};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::error::PoolError;
use crate::pool::CredentialPool;

/// 首次运行时写入的占位凭证
pub const DEFAULT_CREDENTIALS: [&str; 2] = ["KEY1-PLEASE-CHANGE", "ADDITIONAL KEYS AFTER COMMA"];

fn default_credentials() -> Vec<String> {
    DEFAULT_CREDENTIALS.iter().map(|c| c.to_string()).collect()
}

/// 加载凭证列表
///
/// 文件不存在时写入占位列表；内容损坏时回退到占位列表（不覆盖原文件）。
pub fn load_credentials(path: &Path) -> LoadOutcome<Vec<String>> {
    match read_json::<Vec<String>>(path) {
        Ok(Some(credentials)) => LoadOutcome::clean(credentials),
        Ok(None) => {
            let credentials = default_credentials();
            match atomic_write_json(path, &credentials) {
                Ok(()) => info!("[凭证] 已创建占位凭证文件 {}", path.display()),
                Err(e) => warn!("[凭证] 写入占位凭证文件失败: {}", e),
            }
            LoadOutcome::clean(credentials)
        }
        Err(e) => {
            warn!("[凭证] 凭证文件无法读取，使用占位列表: {}", e);
            LoadOutcome::recovered(default_credentials(), e)
        }
    }
}

/// 规范化用户输入的凭证：去除首尾空白、丢弃空行、去重（保留第一次出现的位置）
pub fn normalize_credentials<I, S>(input: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    input
        .into_iter()
        .map(|item| item.as_ref().trim().to_string())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

impl CredentialPool {
    /// 替换凭证列表
    ///
    /// 空列表直接拒绝，原列表保持不变。成功时保留仍在列表中的凭证的配额记录，
    /// 丢弃被移除的凭证，游标归零，并写入凭证文件和账本文件。
    /// 落盘失败时内存状态已经更新，返回 `PoolError::Persistence`。
    pub fn replace_credentials<I, S>(&self, input: I) -> Result<Vec<String>, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials = normalize_credentials(input);
        if credentials.is_empty() {
            return Err(PoolError::EmptyPool);
        }

        let mut state = self.state.lock();
        let retained = credentials
            .iter()
            .filter(|c| state.credentials.contains(*c))
            .count();
        let removed = state.credentials.len().saturating_sub(retained);

        state.ledger = state.ledger.rekey(&credentials);
        state.credentials = credentials.clone();

        info!(
            "[凭证] 凭证列表已更新：共 {} 个，保留 {} 个，移除 {} 个",
            credentials.len(),
            retained,
            removed
        );

        self.write_credentials(&state.credentials)?;
        self.write_ledger(&state.ledger)?;
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{load_ledger, LedgerState};
    use crate::pool::PoolFiles;
    use crate::types::QuotaRecord;
    use chrono::Utc;
    use std::fs;

    fn pool_in(dir: &Path, credentials: &[&str]) -> CredentialPool {
        CredentialPool::from_parts(
            PoolFiles::new(dir.join("keys.json"), dir.join("key_state.json")),
            10,
            credentials.iter().map(|c| c.to_string()).collect(),
            LedgerState::new(),
        )
    }

    #[test]
    fn test_load_existing_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, r#"["a", "b", "c"]"#).unwrap();

        let outcome = load_credentials(&path);
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.value, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_load_corrupt_list_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, r#"{"a": 1}"#).unwrap();

        let outcome = load_credentials(&path);

        assert_eq!(outcome.value, default_credentials());
        assert!(outcome.warning.unwrap().is_corrupt());
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_normalize_credentials() {
        let normalized = normalize_credentials(["  a ", "", "b", "   ", "a", "c\t"]);
        assert_eq!(normalized, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_replace_rejects_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(dir.path(), &["a"]);

        let err = pool.replace_credentials(["", "  "]).unwrap_err();

        assert!(matches!(err, PoolError::EmptyPool));
        assert_eq!(pool.credentials(), vec!["a"]);
        assert!(!dir.path().join("keys.json").exists());
    }

    #[test]
    fn test_replace_rekeys_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(dir.path(), &["a", "b"]);
        pool.record_usage_at("a", 3, Utc::now()).unwrap();
        pool.record_usage_at("b", 12, Utc::now()).unwrap();
        let kept = pool.record("b").unwrap();

        let credentials = pool.replace_credentials(["b", "c"]).unwrap();

        assert_eq!(credentials, vec!["b", "c"]);
        assert_eq!(pool.record("b"), Some(kept));
        assert_eq!(pool.record("c"), Some(QuotaRecord::default()));
        assert!(pool.record("a").is_none());
        assert_eq!(pool.ledger_snapshot().cursor(), 0);

        let on_disk: Vec<String> = read_json(&dir.path().join("keys.json")).unwrap().unwrap();
        assert_eq!(on_disk, vec!["b", "c"]);
        let ledger = load_ledger(&dir.path().join("key_state.json")).value;
        assert!(ledger.record("a").is_none());
        assert!(ledger.record("b").unwrap().invalid);
    }

    #[test]
    fn test_replace_resets_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(dir.path(), &["a", "b", "c"]);
        assert_eq!(pool.next_credential().unwrap(), "a");
        assert_eq!(pool.next_credential().unwrap(), "b");

        pool.replace_credentials(["a", "b", "c"]).unwrap();

        assert_eq!(pool.next_credential().unwrap(), "a");
    }
}
