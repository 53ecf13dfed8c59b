//! 凭证相关类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 凭证被服务端拒绝（401/403）时写入两个计数器的哨兵值
///
/// 非零以区别于"从未使用"，同时不影响后续选择时的跳过判断。
pub const POISON_SENTINEL: u64 = 4;

/// 单个凭证的配额记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaRecord {
    /// 当前窗口内成功发送的分块数
    pub chunks_used: u64,
    /// 当前窗口内成功发送的字符数
    pub chars_used: u64,
    /// 当前窗口内首次使用时间，`None` 表示窗口尚未开启
    pub first_used_at: Option<DateTime<Utc>>,
    /// 是否已确认不可用（超出配额或被拒绝）
    pub invalid: bool,
}

impl QuotaRecord {
    /// 是否可被选中
    pub fn is_eligible(&self, char_limit: u64) -> bool {
        !self.invalid && self.chars_used < char_limit
    }

    /// 当前窗口剩余字符数
    pub fn remaining(&self, char_limit: u64) -> u64 {
        char_limit.saturating_sub(self.chars_used)
    }

    pub fn status(&self, char_limit: u64) -> CredentialStatus {
        if self.chars_used >= char_limit {
            CredentialStatus::Exhausted
        } else if self.invalid {
            CredentialStatus::Rejected
        } else {
            CredentialStatus::Active
        }
    }
}

/// 凭证状态（用于展示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    /// 可用
    Active,
    /// 配额用尽
    Exhausted,
    /// 被服务端拒绝
    Rejected,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Exhausted => "exhausted",
            CredentialStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 掩码凭证，用于日志和列表展示
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 12 {
        "****".to_string()
    } else {
        let prefix: String = chars[..6].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{prefix}****{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility() {
        let mut record = QuotaRecord::default();
        assert!(record.is_eligible(10));

        record.chars_used = 9;
        assert!(record.is_eligible(10));
        assert_eq!(record.remaining(10), 1);

        record.chars_used = 10;
        assert!(!record.is_eligible(10));
        assert_eq!(record.remaining(10), 0);

        record.chars_used = 0;
        record.invalid = true;
        assert!(!record.is_eligible(10));
    }

    #[test]
    fn test_status() {
        let mut record = QuotaRecord::default();
        assert_eq!(record.status(10), CredentialStatus::Active);

        record.invalid = true;
        record.chars_used = POISON_SENTINEL;
        assert_eq!(record.status(10), CredentialStatus::Rejected);

        record.chars_used = 12;
        assert_eq!(record.status(10), CredentialStatus::Exhausted);
    }

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("short"), "****");
        assert_eq!(mask_credential("abcdefghijklmnop"), "abcdef****mnop");
    }
}
