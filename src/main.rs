use aiverse_tts::commands::{config_cmd, convert_cmd, key_cmd, voice_cmd};
use aiverse_tts::AppContext;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aiverse-tts", version)]
#[command(about = "按凭证配额轮询的长文本语音合成工具")]
struct Cli {
    /// 数据目录（凭证、账本、配置、音色缓存）
    #[arg(long, global = true, env = "AIVERSE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// 合成服务地址（用于代理）
    #[arg(long, global = true, env = "AIVERSE_API_HOST")]
    api_host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 转换文本为音频
    Convert(convert_cmd::ConvertArgs),
    /// 管理凭证
    #[command(subcommand)]
    Keys(key_cmd::KeysCommand),
    /// 列出可用音色
    Voices {
        /// 忽略缓存，强制从远端拉取
        #[arg(long)]
        refresh: bool,
    },
    /// 查看配置
    #[command(subcommand)]
    Config(config_cmd::ConfigCommand),
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let ctx = AppContext::bootstrap(cli.data_dir, cli.api_host)?;
    match cli.command {
        Command::Convert(args) => convert_cmd::run(&ctx, args).await,
        Command::Keys(command) => key_cmd::run(&ctx, command),
        Command::Voices { refresh } => voice_cmd::run(&ctx, refresh).await,
        Command::Config(command) => config_cmd::run(&ctx, command),
    }
}
