//! AIVerse TTS
//!
//! 命令行前端：把长文本按凭证配额轮询地转换为分块音频。
//! 核心逻辑在 `aiverse-credential`（凭证池）和 `aiverse-processor`（调度引擎）中。

pub mod app;
pub mod commands;

pub use app::AppContext;
