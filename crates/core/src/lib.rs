//! AIVerse TTS 核心 crate
//!
//! 提供配置、数据目录、持久化层和公共错误类型。
//! 不依赖网络和具体的语音服务，可被任何上层 crate 使用。
//!
//! ## 模块结构
//!
//! - `config` - `config.json` 的加载、默认值和保存
//! - `error` - 持久化错误类型
//! - `paths` - 数据目录下各持久化文件的路径
//! - `persist` - 原子写入、读取和快照备份

pub mod config;
pub mod error;
pub mod paths;
pub mod persist;

pub use config::{
    AppConfig, VoiceSettings, DEFAULT_CHAR_LIMIT, DEFAULT_UPDATE_INTERVAL_DAYS,
};
pub use error::{PersistError, Result};
pub use paths::AppPaths;
pub use persist::{atomic_write, atomic_write_json, backup_file, read_json, LoadOutcome};
