//! 应用上下文
//!
//! 启动时解析数据目录、加载配置、打开凭证池并创建合成客户端，
//! 之后所有命令共享同一个上下文。

pub mod utils;

use aiverse_core::{AppConfig, AppPaths};
use aiverse_credential::{CredentialPool, PoolFiles};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use voice_core::ElevenLabsClient;

/// 应用上下文
pub struct AppContext {
    pub paths: AppPaths,
    pub config: AppConfig,
    pub pool: Arc<CredentialPool>,
    pub client: Arc<ElevenLabsClient>,
}

impl AppContext {
    /// 初始化上下文
    ///
    /// `data_dir` 为空时使用系统数据目录。状态文件损坏只记录警告，不阻止启动。
    pub fn bootstrap(data_dir: Option<PathBuf>, api_host: Option<String>) -> Result<Self> {
        let root = match data_dir {
            Some(dir) => dir,
            None => AppPaths::default_root().context("无法确定系统数据目录，请使用 --data-dir 指定")?,
        };
        let paths = AppPaths::new(root);
        paths
            .ensure_root()
            .with_context(|| format!("无法创建数据目录 {}", paths.root().display()))?;
        tracing::debug!("[启动] 数据目录: {}", paths.root().display());

        let loaded = AppConfig::load_or_init(&paths.config_file());
        if let Some(warning) = loaded.warning {
            tracing::warn!("[启动] 配置文件已回退到默认值: {}", warning);
        }
        let config = loaded.value;

        let files = PoolFiles::new(paths.credentials_file(), paths.ledger_file());
        let (pool, warnings) = CredentialPool::open(files, config.char_limit);
        for warning in warnings {
            tracing::warn!("[启动] 状态文件已回退到默认值: {}", warning);
        }

        let mut client = ElevenLabsClient::new();
        if let Some(host) = api_host {
            utils::validate_api_host(&host)?;
            client = client.with_host(host);
        }

        Ok(Self {
            paths,
            config,
            pool: Arc::new(pool),
            client: Arc::new(client),
        })
    }
}
