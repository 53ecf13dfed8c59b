//! 文本分块与合成调度
//!
//! ## 模块结构
//!
//! - `chunker` - 按词切分文本
//! - `engine` - 调度引擎：取凭证、调用合成服务、记账、节流、取消
//! - `event` - 任务状态、事件和结束报告
//! - `output` - 音频文件写入（不覆盖已有文件）

pub mod chunker;
pub mod engine;
pub mod error;
pub mod event;
pub mod output;

pub use chunker::{split_text, DEFAULT_CHUNK_SIZE};
pub use engine::{
    ChunkOutcome, ConversionJob, DispatchEngine, EngineConfig, JobHandle, SkipReason,
    DEFAULT_BASE_FILENAME, DEFAULT_INTER_CHUNK_DELAY,
};
pub use error::{JobError, OutputError};
pub use event::{JobEvent, JobReport, JobState, StopReason};
pub use output::write_audio;
