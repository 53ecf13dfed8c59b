//! 音色列表命令

use anyhow::Result;
use chrono::Utc;
use voice_core::{resolve_voices, VoiceLookup};

use crate::app::AppContext;

/// 获取音色列表，拉取时被拒绝的凭证会被拉黑
pub async fn lookup(ctx: &AppContext, refresh: bool) -> VoiceLookup {
    let char_limit = ctx.pool.char_limit();
    let credentials: Vec<String> = ctx
        .pool
        .usage()
        .into_iter()
        .filter(|(_, record)| record.is_eligible(char_limit))
        .map(|(credential, _)| credential)
        .collect();

    let lookup = resolve_voices(
        &ctx.paths.voice_cache_file(),
        ctx.config.quota_window(),
        &credentials,
        ctx.client.as_ref(),
        refresh,
        Utc::now(),
    )
    .await;

    for credential in &lookup.rejected {
        if let Err(e) = ctx.pool.poison(credential) {
            tracing::warn!("[音色] 写入账本失败: {}", e);
        }
    }
    lookup
}

pub async fn run(ctx: &AppContext, refresh: bool) -> Result<()> {
    let lookup = lookup(ctx, refresh).await;
    println!("{} 个音色（来源: {}）", lookup.voices.len(), lookup.source.as_str());
    for voice in &lookup.voices {
        println!("{:<24} {}", voice.name, voice.voice_id);
    }
    Ok(())
}
