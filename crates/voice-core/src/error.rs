//! 错误类型

use aiverse_core::PersistError;
use thiserror::Error;

/// 语音服务错误
#[derive(Debug, Error)]
pub enum VoiceError {
    /// 网络错误（连接失败、超时等），请求未得到响应
    #[error("网络错误: {0}")]
    Network(String),

    /// 凭证被拒绝（401/403）
    #[error("凭证被拒绝: HTTP {status}")]
    Rejected { status: u16 },

    /// 服务端返回其他非成功状态
    #[error("服务端错误: HTTP {status} - {body}")]
    Api { status: u16, body: String },

    /// 响应内容无法解析
    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    /// 音色缓存读写失败
    #[error("音色缓存错误: {0}")]
    Cache(#[from] PersistError),
}

impl VoiceError {
    /// 是否为凭证被拒绝
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;
