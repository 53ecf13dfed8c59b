//! 命令行子命令
//!
//! 每个子命令一个模块，共享 `AppContext`。

pub mod config_cmd;
pub mod convert_cmd;
pub mod key_cmd;
pub mod voice_cmd;
