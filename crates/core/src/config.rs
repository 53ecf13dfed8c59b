//! 应用配置
//!
//! 对应数据目录下的 `config.json`。缺失时用默认值创建，内容损坏时回退到默认值。
//! 核心不使用的字段（如界面主题）原样保留，保存时写回。

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::persist::{atomic_write_json, read_json, LoadOutcome};

/// 单个凭证在一个配额窗口内允许使用的字符数
pub const DEFAULT_CHAR_LIMIT: u64 = 7500;
/// 配额窗口（天），同时也是音色缓存的有效期
pub const DEFAULT_UPDATE_INTERVAL_DAYS: u32 = 14;

/// 合成请求附带的音色参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f64,
    #[serde(default = "default_stability")]
    pub stability: f64,
    #[serde(default = "default_use_speaker_boost")]
    pub use_speaker_boost: bool,
}

fn default_similarity_boost() -> f64 {
    0.6
}
fn default_stability() -> f64 {
    0.4
}
fn default_use_speaker_boost() -> bool {
    true
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            similarity_boost: default_similarity_boost(),
            stability: default_stability(),
            use_speaker_boost: default_use_speaker_boost(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 单个凭证的字符配额
    #[serde(default = "default_char_limit")]
    pub char_limit: u64,
    /// 音色参数
    #[serde(default)]
    pub voice_settings: VoiceSettings,
    /// 配额窗口 / 音色缓存有效期（天）
    #[serde(default = "default_update_interval_days")]
    pub update_interval_days: u32,
    /// 其余字段（界面偏好等），核心不解释，只负责保留
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_char_limit() -> u64 {
    DEFAULT_CHAR_LIMIT
}
fn default_update_interval_days() -> u32 {
    DEFAULT_UPDATE_INTERVAL_DAYS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            char_limit: DEFAULT_CHAR_LIMIT,
            voice_settings: VoiceSettings::default(),
            update_interval_days: DEFAULT_UPDATE_INTERVAL_DAYS,
            extra: serde_json::Map::new(),
        }
    }
}

impl AppConfig {
    /// 配额窗口长度
    pub fn quota_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.update_interval_days))
    }

    /// 加载配置，文件不存在时写入默认配置
    pub fn load_or_init(path: &Path) -> LoadOutcome<Self> {
        match read_json::<Self>(path) {
            Ok(Some(config)) => LoadOutcome::clean(config),
            Ok(None) => {
                let config = Self::default();
                match config.save(path) {
                    Ok(()) => info!("[配置] 已创建默认配置 {}", path.display()),
                    Err(e) => warn!("[配置] 写入默认配置失败: {}", e),
                }
                LoadOutcome::clean(config)
            }
            Err(e) => {
                warn!("[配置] 读取失败，使用默认配置: {}", e);
                LoadOutcome::recovered(Self::default(), e)
            }
        }
    }

    /// 原子保存配置
    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json(path, self)
    }
}
