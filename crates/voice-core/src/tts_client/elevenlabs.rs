//! ElevenLabs 合成客户端
//!
//! 合成：`POST {host}/v1/text-to-speech/{voice_id}/stream`，返回 mp3 音频。
//! 音色：`GET {host}/v1/voices`。凭证通过 `xi-api-key` header 传递。

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SynthesisClient, VoiceCatalogClient};
use crate::error::{Result, VoiceError};
use crate::types::{AudioFormat, AudioPayload, SynthesisRequest, VoiceInfo};
use aiverse_core::VoiceSettings;

/// 默认 API Host
const DEFAULT_API_HOST: &str = "https://api.elevenlabs.io";
/// 单次请求超时（秒）
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const API_KEY_HEADER: &str = "xi-api-key";

/// 合成请求体
#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    voice_settings: &'a VoiceSettings,
}

/// 音色列表响应
#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

/// ElevenLabs 客户端
pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_host: String,
    timeout: Duration,
}

impl ElevenLabsClient {
    /// 创建新的客户端
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            api_host: DEFAULT_API_HOST.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// 设置 API Host（用于代理）
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = host.into().trim_end_matches('/').to_string();
        self
    }

    /// 设置单次请求超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 当前使用的 API Host
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    fn synthesis_url(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}/stream", self.api_host, voice_id)
    }

    fn voices_url(&self) -> String {
        format!("{}/v1/voices", self.api_host)
    }
}

impl Default for ElevenLabsClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 将非成功状态码映射为错误；401/403 视为凭证被拒绝
fn status_error(status: u16, body: String) -> VoiceError {
    match status {
        401 | 403 => VoiceError::Rejected { status },
        _ => VoiceError::Api { status, body },
    }
}

/// 成功响应的音频内容；空响应体不算合成成功
fn audio_payload(bytes: Bytes) -> Result<AudioPayload> {
    let payload = AudioPayload::new(bytes, AudioFormat::Mp3);
    if payload.is_empty() {
        return Err(VoiceError::InvalidResponse("音频内容为空".to_string()));
    }
    Ok(payload)
}

#[async_trait]
impl SynthesisClient for ElevenLabsClient {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        credential: &str,
    ) -> Result<AudioPayload> {
        let body = SynthesisBody {
            text: &request.text,
            voice_settings: &request.voice_settings,
        };

        let response = self
            .http
            .post(self.synthesis_url(&request.voice_id))
            .header(API_KEY_HEADER, credential)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Network(e.to_string()))?;

        let payload = audio_payload(bytes)?;
        tracing::debug!(
            "[合成] 收到音频 {} 字节（{} 字符）",
            payload.len(),
            request.char_count()
        );
        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "ElevenLabs"
    }
}

#[async_trait]
impl VoiceCatalogClient for ElevenLabsClient {
    async fn list_voices(&self, credential: &str) -> Result<Vec<VoiceInfo>> {
        let response = self
            .http
            .get(self.voices_url())
            .header(API_KEY_HEADER, credential)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| VoiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let result: VoicesResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::InvalidResponse(e.to_string()))?;
        Ok(result.voices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = ElevenLabsClient::new().with_host("http://localhost:8080/");
        assert_eq!(
            client.synthesis_url("voice-1"),
            "http://localhost:8080/v1/text-to-speech/voice-1/stream"
        );
        assert_eq!(client.voices_url(), "http://localhost:8080/v1/voices");
        assert_eq!(client.api_host(), "http://localhost:8080");
        assert_eq!(ElevenLabsClient::new().api_host(), DEFAULT_API_HOST);
    }

    #[test]
    fn test_empty_audio_is_invalid_response() {
        assert!(matches!(
            audio_payload(Bytes::new()),
            Err(VoiceError::InvalidResponse(_))
        ));
        let payload = audio_payload(Bytes::from_static(b"ID3")).unwrap();
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(status_error(401, String::new()).is_rejection());
        assert!(status_error(403, String::new()).is_rejection());
        assert!(matches!(
            status_error(429, "slow down".into()),
            VoiceError::Api { status: 429, .. }
        ));
        assert!(!status_error(500, String::new()).is_rejection());
    }

    #[test]
    fn test_request_body_shape() {
        let settings = VoiceSettings::default();
        let body = SynthesisBody {
            text: "hello",
            voice_settings: &settings,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["voice_settings"]["stability"], 0.4);
        assert_eq!(json["voice_settings"]["use_speaker_boost"], true);
    }

    #[test]
    fn test_voices_response_tolerates_extra_fields() {
        let parsed: VoicesResponse = serde_json::from_str(
            r#"{"voices": [{"voice_id": "a1", "name": "Adam", "labels": {}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.voices, vec![VoiceInfo::new("Adam", "a1")]);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = ElevenLabsClient::new()
            .with_host("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));

        let err = client
            .synthesize(&SynthesisRequest::new("hi", "v"), "key")
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::Network(_)));
    }
}
