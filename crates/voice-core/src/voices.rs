//! 音色目录
//!
//! 音色列表缓存在 `voices_cache.json`，有效期与配额窗口相同。
//! 查找顺序：新鲜缓存 → 远端 → 过期缓存 → 仅默认音色。

use aiverse_core::{atomic_write_json, read_json};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Result, VoiceError};
use crate::tts_client::VoiceCatalogClient;
use crate::types::{VoiceInfo, DEFAULT_VOICE_NAME};

/// 音色缓存文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCache {
    /// 拉取时间（ISO-8601）
    pub fetched_at: String,
    #[serde(default)]
    pub voices: Vec<VoiceInfo>,
}

impl VoiceCache {
    pub fn new(voices: Vec<VoiceInfo>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            fetched_at: fetched_at.to_rfc3339(),
            voices,
        }
    }

    /// 读取缓存，文件不存在时返回 `None`
    pub fn load(path: &Path) -> Result<Option<Self>> {
        Ok(read_json(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json(path, self)?;
        Ok(())
    }

    /// 拉取时间；无法解析时返回 `None`
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.fetched_at.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|t| t.and_utc())
            })
    }

    /// 缓存是否仍在有效期内；时间无法解析视为过期
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.fetched_at()
            .map(|fetched| now - fetched < max_age)
            .unwrap_or(false)
    }
}

/// 音色列表来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSource {
    /// 有效期内的缓存
    Cache,
    /// 刚从远端拉取
    Remote,
    /// 远端不可用时使用的过期缓存
    StaleCache,
    /// 没有任何可用列表，只剩默认音色
    Fallback,
}

impl VoiceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Remote => "remote",
            Self::StaleCache => "stale-cache",
            Self::Fallback => "fallback",
        }
    }
}

/// 音色查找结果
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceLookup {
    /// 按名称去重，默认音色排在最前
    pub voices: Vec<VoiceInfo>,
    pub source: VoiceSource,
    /// 拉取过程中被服务端拒绝的凭证，由调用方决定是否拉黑
    pub rejected: Vec<String>,
}

impl VoiceLookup {
    /// 按名称查找音色 ID
    pub fn voice_id(&self, name: &str) -> Option<&str> {
        self.voices
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.voice_id.as_str())
    }
}

/// 去重并确保默认音色存在，默认音色排第一，其余按名称排序
fn with_default_voice(voices: Vec<VoiceInfo>) -> Vec<VoiceInfo> {
    let mut by_name: BTreeMap<String, String> = BTreeMap::new();
    for voice in voices {
        by_name.insert(voice.name, voice.voice_id);
    }
    let default = VoiceInfo::default_voice();
    by_name.entry(default.name).or_insert(default.voice_id);

    let mut voices: Vec<VoiceInfo> = by_name
        .into_iter()
        .map(|(name, voice_id)| VoiceInfo { name, voice_id })
        .collect();
    voices.sort_by_key(|v| v.name != DEFAULT_VOICE_NAME);
    voices
}

/// 依次使用凭证拉取音色列表，第一个返回非空列表的凭证即停止
async fn fetch_remote(
    client: &dyn VoiceCatalogClient,
    credentials: &[String],
    rejected: &mut Vec<String>,
) -> Option<Vec<VoiceInfo>> {
    for credential in credentials {
        match client.list_voices(credential).await {
            Ok(voices) if !voices.is_empty() => return Some(voices),
            Ok(_) => debug!("[音色] 远端返回空列表"),
            Err(VoiceError::Rejected { status }) => {
                warn!("[音色] 凭证被拒绝 (HTTP {})", status);
                rejected.push(credential.clone());
            }
            Err(e) => debug!("[音色] 拉取失败: {}", e),
        }
    }
    None
}

/// 获取音色列表
///
/// `credentials` 应只包含仍可用的凭证。缓存读写失败只记录日志。
pub async fn resolve_voices(
    cache_path: &Path,
    max_age: Duration,
    credentials: &[String],
    client: &dyn VoiceCatalogClient,
    force_refresh: bool,
    now: DateTime<Utc>,
) -> VoiceLookup {
    let cache = match VoiceCache::load(cache_path) {
        Ok(cache) => cache,
        Err(e) => {
            warn!("[音色] 缓存无法读取，忽略: {}", e);
            None
        }
    };

    if !force_refresh {
        if let Some(cache) = cache.as_ref().filter(|c| c.is_fresh(now, max_age)) {
            debug!("[音色] 使用缓存（{} 个音色）", cache.voices.len());
            return VoiceLookup {
                voices: with_default_voice(cache.voices.clone()),
                source: VoiceSource::Cache,
                rejected: Vec::new(),
            };
        }
    }

    let mut rejected = Vec::new();
    if let Some(voices) = fetch_remote(client, credentials, &mut rejected).await {
        info!("[音色] 已从远端获取 {} 个音色", voices.len());
        let fresh = VoiceCache::new(voices, now);
        if let Err(e) = fresh.save(cache_path) {
            warn!("[音色] 写入缓存失败: {}", e);
        }
        return VoiceLookup {
            voices: with_default_voice(fresh.voices),
            source: VoiceSource::Remote,
            rejected,
        };
    }

    match cache {
        Some(cache) => {
            info!("[音色] 远端不可用，使用过期缓存");
            VoiceLookup {
                voices: with_default_voice(cache.voices),
                source: VoiceSource::StaleCache,
                rejected,
            }
        }
        None => VoiceLookup {
            voices: with_default_voice(Vec::new()),
            source: VoiceSource::Fallback,
            rejected,
        },
    }
}
