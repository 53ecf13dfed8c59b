//! voice-core - 语音合成核心库
//!
//! 提供云端合成服务客户端和音色目录缓存。
//! 不关心凭证轮询和配额，调用方负责为每个请求提供凭证。

pub mod error;
pub mod tts_client;
pub mod types;
pub mod voices;

pub use error::{Result, VoiceError};
pub use tts_client::{ElevenLabsClient, SynthesisClient, VoiceCatalogClient};
pub use types::*;
pub use voices::{resolve_voices, VoiceCache, VoiceLookup, VoiceSource};
