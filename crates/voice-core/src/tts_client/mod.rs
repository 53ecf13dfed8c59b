//! 云端合成服务客户端
//!
//! 引擎只依赖这里的 trait，具体服务商实现可替换（测试中使用 mock）。

mod elevenlabs;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AudioPayload, SynthesisRequest, VoiceInfo};

pub use elevenlabs::ElevenLabsClient;

/// 文本合成服务
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// 使用指定凭证合成一个分块
    ///
    /// 凭证被拒绝时必须返回 `VoiceError::Rejected`，以便调用方拉黑该凭证。
    async fn synthesize(&self, request: &SynthesisRequest, credential: &str)
        -> Result<AudioPayload>;

    /// 服务名称
    fn name(&self) -> &'static str;
}

/// 音色目录服务
#[async_trait]
pub trait VoiceCatalogClient: Send + Sync {
    /// 使用指定凭证获取可用音色列表
    async fn list_voices(&self, credential: &str) -> Result<Vec<VoiceInfo>>;
}
