//! 数据目录布局
//!
//! 所有持久化文件都放在同一个数据目录下，原子写入依赖临时文件与目标文件同目录。

use std::io;
use std::path::{Path, PathBuf};

/// 数据目录名（位于系统数据目录下）
pub const APP_DIR_NAME: &str = "aiverse-tts";

const CREDENTIALS_FILE: &str = "keys.json";
const LEDGER_FILE: &str = "key_state.json";
const CONFIG_FILE: &str = "config.json";
const VOICE_CACHE_FILE: &str = "voices_cache.json";
const OUTPUT_DIR: &str = "outputs";

/// 数据目录下的文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 系统默认数据目录，如 `~/.local/share/aiverse-tts`
    pub fn default_root() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME))
    }

    /// 确保数据目录存在
    pub fn ensure_root(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.root.join(CREDENTIALS_FILE)
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn voice_cache_file(&self) -> PathBuf {
        self.root.join(VOICE_CACHE_FILE)
    }

    /// 未指定输出目录时使用的默认目录
    pub fn default_output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }
}
