//! 配置命令

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::app::AppContext;

/// `config` 子命令
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// 显示当前生效的配置和数据目录
    Show,
}

pub fn run(ctx: &AppContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let rendered =
                serde_json::to_string_pretty(&ctx.config).context("配置序列化失败")?;
            println!("数据目录: {}", ctx.paths.root().display());
            println!("配置文件: {}", ctx.paths.config_file().display());
            println!("API Host: {}", ctx.client.api_host());
            println!("{rendered}");
            Ok(())
        }
    }
}
