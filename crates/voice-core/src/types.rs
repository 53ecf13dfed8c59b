//! 类型定义
//!
//! 定义语音合成相关的核心类型。

use aiverse_core::VoiceSettings;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 默认音色 ID
pub const DEFAULT_VOICE_ID: &str = "z9fAnlkpzviPz146aGWa";
/// 默认音色名称
pub const DEFAULT_VOICE_NAME: &str = "Glinda";

/// 合成请求
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// 待合成文本（一个分块）
    pub text: String,
    /// 音色 ID
    pub voice_id: String,
    /// 音色参数
    pub voice_settings: VoiceSettings,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            voice_settings: VoiceSettings::default(),
        }
    }

    pub fn with_settings(mut self, voice_settings: VoiceSettings) -> Self {
        self.voice_settings = voice_settings;
        self
    }

    /// 计费字符数
    pub fn char_count(&self) -> u64 {
        self.text.chars().count() as u64
    }
}

/// 音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// 文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::Mp3
    }
}

/// 合成结果
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    /// 编码后的音频数据
    pub bytes: Bytes,
    /// 音频格式
    pub format: AudioFormat,
}

impl AudioPayload {
    pub fn new(bytes: impl Into<Bytes>, format: AudioFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 音色信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    #[serde(alias = "id")]
    pub voice_id: String,
}

impl VoiceInfo {
    pub fn new(name: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice_id: voice_id.into(),
        }
    }

    /// 默认音色
    pub fn default_voice() -> Self {
        Self::new(DEFAULT_VOICE_NAME, DEFAULT_VOICE_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_count_uses_scalar_values() {
        let request = SynthesisRequest::new("héllo 世界", DEFAULT_VOICE_ID);
        assert_eq!(request.char_count(), 8);
    }

    #[test]
    fn test_voice_info_accepts_id_alias() {
        let voice: VoiceInfo = serde_json::from_str(r#"{"name": "Adam", "id": "abc"}"#).unwrap();
        assert_eq!(voice, VoiceInfo::new("Adam", "abc"));

        let voice: VoiceInfo =
            serde_json::from_str(r#"{"name": "Bella", "voice_id": "def", "category": "premade"}"#)
                .unwrap();
        assert_eq!(voice.voice_id, "def");
    }

    #[test]
    fn test_audio_format_extension() {
        assert_eq!(AudioFormat::default().extension(), "mp3");
        assert_eq!(AudioFormat::Wav.extension(), "wav");
    }
}
