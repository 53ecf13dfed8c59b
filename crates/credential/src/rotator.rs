//! 轮询选择
//!
//! 从游标位置开始最多检查一整圈凭证，每检查一个都推进游标。
//! 检查和推进在同一次加锁内完成，并发调用不会在同一游标位置拿到同一个凭证。

use tracing::{debug, warn};

use crate::error::PoolError;
use crate::ledger::LedgerState;
use crate::pool::CredentialPool;
use crate::types::mask_credential;

/// 一次选择的结果
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Selection {
    pub(crate) credential: Option<String>,
    /// 扫描中发现已达上限、顺带标记为失效的凭证
    pub(crate) invalidated: Vec<String>,
}

/// 在给定列表和账本上选出下一个可用凭证
pub(crate) fn select_next(
    credentials: &[String],
    ledger: &mut LedgerState,
    char_limit: u64,
) -> Selection {
    let mut selection = Selection::default();
    let total = credentials.len();
    if total == 0 {
        return selection;
    }

    let mut cursor = ledger.cursor() % total;
    for _ in 0..total {
        let credential = &credentials[cursor];
        cursor = (cursor + 1) % total;

        let record = ledger.record_mut(credential);
        if record.invalid {
            continue;
        }
        if record.chars_used < char_limit {
            selection.credential = Some(credential.clone());
            break;
        }
        record.invalid = true;
        selection.invalidated.push(credential.clone());
    }

    ledger.set_cursor(cursor);
    selection
}

impl CredentialPool {
    /// 选出下一个可用凭证
    ///
    /// 一整圈都没有可用凭证（或列表为空）时返回 `PoolError::ExhaustedPool`。
    pub fn next_credential(&self) -> Result<String, PoolError> {
        let mut state = self.state.lock();
        let state = &mut *state;
        let selection = select_next(&state.credentials, &mut state.ledger, self.char_limit);

        if !selection.invalidated.is_empty() {
            for credential in &selection.invalidated {
                debug!("[轮询] 凭证 {} 已达上限，标记失效", mask_credential(credential));
            }
            if let Err(e) = self.write_ledger(&state.ledger) {
                warn!("[轮询] 写入账本失败: {}", e);
            }
        }

        selection.credential.ok_or(PoolError::ExhaustedPool)
    }
}
