//! 转换命令
//!
//! 启动后台任务，每 100 毫秒取一次事件并输出；Ctrl-C 请求取消，
//! 当前分块完成后停止。

use aiverse_core::AppPaths;
use aiverse_processor::{
    ConversionJob, DispatchEngine, EngineConfig, JobEvent, JobReport, StopReason,
    DEFAULT_BASE_FILENAME,
};
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use voice_core::{VoiceCache, DEFAULT_VOICE_ID, DEFAULT_VOICE_NAME};

use crate::app::utils::{base_name_from_input, read_text_input};
use crate::app::AppContext;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `convert` 参数
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// 输入文本文件
    #[arg(short, long, conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// 直接传入文本
    #[arg(short, long)]
    pub text: Option<String>,

    /// 输出目录（默认为数据目录下的 outputs）
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// 输出文件名前缀（默认为输入文件名，否则为 untitled）
    #[arg(short, long)]
    pub base: Option<String>,

    /// 音色名称或 ID
    #[arg(short, long)]
    pub voice: Option<String>,

    /// 分块大小（字符）
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// 分块之间的间隔（秒）
    #[arg(long)]
    pub delay: Option<u64>,
}

/// 把音色参数解析为 ID：先按名称查本地缓存，找不到则原样当作 ID
fn resolve_voice_id(paths: &AppPaths, voice: Option<&str>) -> String {
    let Some(voice) = voice.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_VOICE_ID.to_string();
    };
    if voice.eq_ignore_ascii_case(DEFAULT_VOICE_NAME) {
        return DEFAULT_VOICE_ID.to_string();
    }
    match VoiceCache::load(&paths.voice_cache_file()) {
        Ok(Some(cache)) => cache
            .voices
            .into_iter()
            .find(|v| v.name.eq_ignore_ascii_case(voice))
            .map(|v| v.voice_id)
            .unwrap_or_else(|| voice.to_string()),
        _ => voice.to_string(),
    }
}

fn render_event(event: &JobEvent) {
    match event {
        JobEvent::Progress { done, total } => println!("[{done}/{total}]"),
        JobEvent::LogLine { text } => println!("{text}"),
        JobEvent::JobEnded { .. } => {}
    }
}

fn render_report(report: &JobReport) {
    println!(
        "完成 {}/{} 个分块，跳过 {}，未处理 {}",
        report.completed_chunks,
        report.total_chunks,
        report.skipped_chunks,
        report.remaining_chunks()
    );
}

pub async fn run(ctx: &AppContext, args: ConvertArgs) -> Result<()> {
    let text = read_text_input(args.input.as_deref(), args.text)?;
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| ctx.paths.default_output_dir());
    let base = args
        .base
        .or_else(|| base_name_from_input(args.input.as_deref()))
        .unwrap_or_else(|| DEFAULT_BASE_FILENAME.to_string());
    let voice_id = resolve_voice_id(&ctx.paths, args.voice.as_deref());

    let mut config = EngineConfig::from_app_config(&ctx.config);
    if let Some(size) = args.chunk_size.filter(|size| *size > 0) {
        config = config.with_chunk_size(size);
    }
    if let Some(secs) = args.delay {
        config = config.with_inter_chunk_delay(Duration::from_secs(secs));
    }

    tracing::info!(
        "[转换] 输出目录 {}，前缀 {}，音色 {}",
        output_dir.display(),
        base,
        voice_id
    );

    let engine = Arc::new(DispatchEngine::new(
        Arc::clone(&ctx.pool),
        ctx.client.clone(),
        config,
    ));
    let job = ConversionJob::new(text, output_dir)
        .with_base_filename(base)
        .with_voice(voice_id);
    let mut handle = engine.start(job)?;

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("正在取消，当前分块完成后停止……");
            token.cancel();
        }
    });

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    while !handle.is_finished() {
        ticker.tick().await;
        handle.drain_events().iter().for_each(render_event);
    }
    handle.drain_events().iter().for_each(render_event);

    let report = handle.join().await?;
    render_report(&report);

    match report.reason {
        StopReason::Completed | StopReason::Cancelled => Ok(()),
        StopReason::Exhausted => bail!("没有可用的凭证，请使用 `keys set` 添加凭证或等待配额窗口重置"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_core::VoiceInfo;

    #[test]
    fn test_resolve_voice_id() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path());

        assert_eq!(resolve_voice_id(&paths, None), DEFAULT_VOICE_ID);
        assert_eq!(resolve_voice_id(&paths, Some("glinda")), DEFAULT_VOICE_ID);
        assert_eq!(resolve_voice_id(&paths, Some("abc123")), "abc123");

        VoiceCache::new(vec![VoiceInfo::new("Rachel", "r-1")], chrono::Utc::now())
            .save(&paths.voice_cache_file())
            .unwrap();
        assert_eq!(resolve_voice_id(&paths, Some("rachel")), "r-1");
        assert_eq!(resolve_voice_id(&paths, Some("r-9")), "r-9");
    }
}
