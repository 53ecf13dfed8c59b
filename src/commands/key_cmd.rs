//! 凭证管理命令
//!
//! 列出凭证用量、替换凭证列表、从文件导入凭证。

use aiverse_credential::{mask_credential, PoolError, QuotaRecord};
use anyhow::{bail, Context, Result};
use chrono::{Duration, SecondsFormat, Utc};
use clap::Subcommand;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::app::utils::parse_key_lines;
use crate::app::AppContext;

/// `keys` 子命令
#[derive(Debug, Subcommand)]
pub enum KeysCommand {
    /// 列出凭证及用量（凭证已掩码）
    List,
    /// 替换凭证列表，顺序即轮询顺序
    Set {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// 从文件导入凭证（每行一个），替换现有列表
    Import { file: PathBuf },
}

/// 单个凭证的展示行
fn usage_row(credential: &str, record: &QuotaRecord, char_limit: u64, window: Duration) -> String {
    let resets_at = record
        .first_used_at
        .map(|first| (first + window).to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<16} {:<10} {:>7}/{:<7} 剩余 {:>7} {:>5} 块  重置于 {}",
        mask_credential(credential),
        record.status(char_limit).as_str(),
        record.chars_used,
        char_limit,
        record.remaining(char_limit),
        record.chunks_used,
        resets_at
    )
}

/// 用量表：先重置已到期的窗口，再按轮询顺序列出
fn usage_table(ctx: &AppContext) -> Vec<String> {
    let window = ctx.config.quota_window();
    match ctx.pool.reset_expired(Utc::now(), window) {
        Ok(summary) if !summary.reset.is_empty() => {
            info!("[凭证] {} 个凭证的配额窗口已到期，已重置", summary.reset.len());
        }
        Ok(_) => {}
        Err(e) => warn!("[凭证] 重置到期凭证时落盘失败: {}", e),
    }

    let usage = ctx.pool.usage();
    let char_limit = ctx.pool.char_limit();
    let available = usage
        .iter()
        .filter(|(_, record)| record.is_eligible(char_limit))
        .count();

    let mut lines = vec![format!("共 {} 个凭证，{} 个可用", usage.len(), available)];
    lines.extend(
        usage
            .iter()
            .map(|(credential, record)| usage_row(credential, record, char_limit, window)),
    );
    lines
}

fn replace(ctx: &AppContext, keys: Vec<String>) -> Result<()> {
    match ctx.pool.replace_credentials(keys) {
        Ok(credentials) => {
            println!("已保存 {} 个凭证", credentials.len());
            Ok(())
        }
        Err(PoolError::EmptyPool) => bail!("凭证列表不能为空，原列表保持不变"),
        Err(e) => Err(e).context("凭证列表已更新，但写入磁盘失败"),
    }
}

pub fn run(ctx: &AppContext, command: KeysCommand) -> Result<()> {
    match command {
        KeysCommand::List => {
            for line in usage_table(ctx) {
                println!("{line}");
            }
            Ok(())
        }
        KeysCommand::Set { keys } => replace(ctx, keys),
        KeysCommand::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("无法读取凭证文件 {}", file.display()))?;
            replace(ctx, parse_key_lines(&content))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiverse_credential::LedgerFile;
    use chrono::TimeZone;

    #[test]
    fn test_usage_row() {
        let record = QuotaRecord {
            chunks_used: 3,
            chars_used: 7600,
            first_used_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
            invalid: true,
        };

        let row = usage_row("sk-abcdefghijklmnop", &record, 7500, Duration::days(14));

        assert!(row.starts_with("sk-abc****mnop"));
        assert!(row.contains("exhausted"));
        assert!(row.contains("7600/7500"));
        assert!(row.contains("剩余       0"));
        assert!(row.contains("2024-03-15T08:00:00Z"));
        assert!(!row.contains("defghijkl"));
    }

    #[test]
    fn test_usage_row_unused() {
        let row = usage_row("short", &QuotaRecord::default(), 7500, Duration::days(14));
        assert!(row.starts_with("****"));
        assert!(row.contains("active"));
        assert!(row.contains("剩余    7500"));
        assert!(row.ends_with("重置于 -"));
    }

    #[test]
    fn test_set_and_import() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::bootstrap(Some(dir.path().to_path_buf()), None).unwrap();

        run(&ctx, KeysCommand::Set { keys: vec![" a ".into(), "b".into(), "a".into()] }).unwrap();
        assert_eq!(ctx.pool.credentials(), vec!["a", "b"]);

        let file = dir.path().join("import.txt");
        std::fs::write(&file, "x\n\ny\n").unwrap();
        run(&ctx, KeysCommand::Import { file }).unwrap();
        assert_eq!(ctx.pool.credentials(), vec!["x", "y"]);

        let err = run(&ctx, KeysCommand::Set { keys: vec!["  ".into()] }).unwrap_err();
        assert!(err.to_string().contains("不能为空"));
        assert_eq!(ctx.pool.credentials(), vec!["x", "y"]);
    }

    #[test]
    fn test_usage_table_resets_expired_windows() {
        let dir = tempfile::tempdir().unwrap();
        let paths = aiverse_core::AppPaths::new(dir.path());
        aiverse_core::atomic_write_json(&paths.credentials_file(), &vec!["sk-expired-key-01"])
            .unwrap();
        let mut ledger = LedgerFile::default();
        ledger.chunks_used.insert("sk-expired-key-01".into(), 3);
        ledger.chars_used.insert("sk-expired-key-01".into(), 7500);
        ledger
            .first_used
            .insert("sk-expired-key-01".into(), "2020-01-01T00:00:00Z".into());
        ledger.invalid.push("sk-expired-key-01".into());
        aiverse_core::atomic_write_json(&paths.ledger_file(), &ledger).unwrap();

        let ctx = AppContext::bootstrap(Some(dir.path().to_path_buf()), None).unwrap();
        let lines = usage_table(&ctx);

        assert_eq!(lines[0], "共 1 个凭证，1 个可用");
        assert!(lines[1].contains("active"));
        assert!(lines[1].ends_with("重置于 -"));
        assert_eq!(ctx.pool.record("sk-expired-key-01"), Some(QuotaRecord::default()));
    }
}
