//! 合成调度引擎
//!
//! 一个任务的生命周期：
//!
//! 1. 从磁盘重新加载凭证列表和账本，重置窗口已到期的凭证
//! 2. 切分文本，发出 `Progress{0, total}`
//! 3. 逐个分块：检查取消 → 取下一个凭证 → 调用合成服务（不持锁）→ 写文件、记账
//! 4. 分块之间固定间隔，间隔期间可被取消打断
//! 5. 任意终态都会再落盘一次账本，然后发出 `JobEnded`
//!
//! 单个分块失败（网络、凭证被拒、服务端错误、写文件失败）只跳过该分块；
//! 只有取消和凭证耗尽会提前结束任务。

use aiverse_core::{AppConfig, VoiceSettings};
use aiverse_credential::{mask_credential, CredentialPool};
use chrono::Utc;
use parking_lot::Mutex;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voice_core::{SynthesisClient, SynthesisRequest, VoiceError, DEFAULT_VOICE_ID};

use crate::chunker::{split_text, DEFAULT_CHUNK_SIZE};
use crate::error::JobError;
use crate::event::{JobEvent, JobReport, JobState, StopReason};
use crate::output::write_audio;

/// 分块之间的默认间隔
pub const DEFAULT_INTER_CHUNK_DELAY: Duration = Duration::from_secs(3);
/// 默认输出文件名前缀
pub const DEFAULT_BASE_FILENAME: &str = "untitled";

/// 引擎配置
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub chunk_size: usize,
    pub inter_chunk_delay: Duration,
    pub quota_window: chrono::Duration,
    pub voice_settings: VoiceSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl EngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            inter_chunk_delay: DEFAULT_INTER_CHUNK_DELAY,
            quota_window: config.quota_window(),
            voice_settings: config.voice_settings.clone(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }
}

/// 一次转换任务
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionJob {
    pub text: String,
    pub output_dir: PathBuf,
    pub base_filename: String,
    pub voice_id: String,
}

impl ConversionJob {
    pub fn new(text: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            output_dir: output_dir.into(),
            base_filename: DEFAULT_BASE_FILENAME.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
        }
    }

    pub fn with_base_filename(mut self, base: impl Into<String>) -> Self {
        self.base_filename = base.into();
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }
}

/// 单个分块被跳过的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 网络错误，请求没有得到响应
    Transport,
    /// 凭证被拒绝（已拉黑）
    Rejected,
    /// 服务端返回其他错误
    Api,
    /// 音频写入失败
    OutputWrite,
}

/// 单个分块的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Produced(PathBuf),
    Skipped(SkipReason),
}

/// 运行中任务的句柄
pub struct JobHandle {
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<JobEvent>,
    task: JoinHandle<JobReport>,
}

impl JobHandle {
    /// 请求取消，在下一个分块边界生效
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 取出当前已到达的全部事件（不等待）
    pub fn drain_events(&mut self) -> Vec<JobEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// 等待下一个事件，任务结束且事件取完后返回 `None`
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<JobReport, JobError> {
        self.task
            .await
            .map_err(|e| JobError::Worker(e.to_string()))
    }
}

/// 任务未跑完就被丢弃（panic、运行时关闭）时把状态从 Running 还原
struct RunningGuard<E: Deref<Target = DispatchEngine>>(E);

impl<E: Deref<Target = DispatchEngine>> Drop for RunningGuard<E> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        if state.is_running() {
            *state = JobState::Idle;
        }
    }
}

/// 合成调度引擎
pub struct DispatchEngine {
    pool: Arc<CredentialPool>,
    client: Arc<dyn SynthesisClient>,
    config: EngineConfig,
    state: Mutex<JobState>,
}

impl DispatchEngine {
    pub fn new(
        pool: Arc<CredentialPool>,
        client: Arc<dyn SynthesisClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            pool,
            client,
            config,
            state: Mutex::new(JobState::Idle),
        }
    }

    pub fn state(&self) -> JobState {
        *self.state.lock()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    fn begin(&self) -> Result<(), JobError> {
        let mut state = self.state.lock();
        if state.is_running() {
            return Err(JobError::AlreadyRunning);
        }
        *state = JobState::Running;
        Ok(())
    }

    /// 在后台启动任务，需在 tokio 运行时内调用
    pub fn start(self: &Arc<Self>, job: ConversionJob) -> Result<JobHandle, JobError> {
        self.begin()?;

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = RunningGuard(Arc::clone(self));
        let token = cancel.clone();
        let task = tokio::spawn(async move { guard.0.execute(job, token, tx).await });

        Ok(JobHandle {
            cancel,
            events: rx,
            task,
        })
    }

    /// 在当前任务中运行到结束
    pub async fn run(
        &self,
        job: ConversionJob,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<JobEvent>,
    ) -> Result<JobReport, JobError> {
        self.begin()?;
        let guard = RunningGuard(self);
        Ok(guard.0.execute(job, cancel, events).await)
    }

    async fn execute(
        &self,
        job: ConversionJob,
        cancel: CancellationToken,
        events: mpsc::UnboundedSender<JobEvent>,
    ) -> JobReport {
        let emit = |event: JobEvent| {
            let _ = events.send(event);
        };
        let log = |text: String| emit(JobEvent::LogLine { text });

        for warning in self.pool.reload() {
            log(format!("状态文件损坏，已使用默认值: {}", warning));
        }
        match self.pool.reset_expired(Utc::now(), self.config.quota_window) {
            Ok(summary) if !summary.reset.is_empty() => {
                log(format!("{} 个凭证的配额窗口已到期，已重置", summary.reset.len()));
            }
            Ok(_) => {}
            Err(e) => warn!("[调度] 重置到期凭证时落盘失败: {}", e),
        }

        let chunks = split_text(&job.text, self.config.chunk_size);
        let total = chunks.len();
        let mut report = JobReport::new(total);
        info!(
            "[调度] 任务开始：{} 个分块，{} 个凭证，服务 {}",
            total,
            self.pool.len(),
            self.client.name()
        );
        emit(JobEvent::Progress { done: 0, total });

        let reason = 'chunks: {
            for (index, chunk) in chunks.iter().enumerate() {
                if cancel.is_cancelled() {
                    log("任务已取消".to_string());
                    break 'chunks StopReason::Cancelled;
                }

                let credential = match self.pool.next_credential() {
                    Ok(credential) => credential,
                    Err(e) => {
                        info!("[调度] 第 {} 个分块无可用凭证: {}", index + 1, e);
                        log("没有可用的凭证，任务停止".to_string());
                        break 'chunks StopReason::Exhausted;
                    }
                };

                match self.dispatch_chunk(&job, index + 1, chunk, &credential).await {
                    ChunkOutcome::Produced(path) => {
                        report.completed_chunks += 1;
                        log(format!("音频已保存: {}", path.display()));
                        report.outputs.push(path);
                        emit(JobEvent::Progress {
                            done: report.completed_chunks,
                            total,
                        });
                    }
                    ChunkOutcome::Skipped(reason) => {
                        report.skipped_chunks += 1;
                        log(format!("第 {} 个分块已跳过: {:?}", index + 1, reason));
                    }
                }

                if index + 1 < total {
                    self.pause(&cancel).await;
                }
            }
            StopReason::Completed
        };
        report.reason = reason;

        if let Err(e) = self.pool.persist() {
            warn!("[调度] 任务结束时写入账本失败: {}", e);
        }
        *self.state.lock() = report.reason.into();

        info!(
            "[调度] 任务结束（{}）：完成 {}/{}，跳过 {}",
            report.reason, report.completed_chunks, total, report.skipped_chunks
        );
        emit(JobEvent::JobEnded {
            reason: report.reason,
        });
        report
    }

    /// 处理单个分块，`index` 从 1 开始
    async fn dispatch_chunk(
        &self,
        job: &ConversionJob,
        index: usize,
        chunk: &str,
        credential: &str,
    ) -> ChunkOutcome {
        let request = SynthesisRequest::new(chunk, job.voice_id.as_str())
            .with_settings(self.config.voice_settings.clone());
        debug!(
            "[调度] 分块 {}（{} 字符）使用凭证 {}",
            index,
            request.char_count(),
            mask_credential(credential)
        );

        let audio = match self.client.synthesize(&request, credential).await {
            Ok(audio) => audio,
            Err(VoiceError::Rejected { status }) => {
                warn!(
                    "[调度] 凭证 {} 被拒绝 (HTTP {})",
                    mask_credential(credential),
                    status
                );
                if let Err(e) = self.pool.poison(credential) {
                    warn!("[调度] 写入账本失败: {}", e);
                }
                return ChunkOutcome::Skipped(SkipReason::Rejected);
            }
            Err(VoiceError::Network(e)) => {
                warn!("[调度] 分块 {} 网络错误: {}", index, e);
                return ChunkOutcome::Skipped(SkipReason::Transport);
            }
            Err(e) => {
                warn!("[调度] 分块 {} 合成失败: {}", index, e);
                return ChunkOutcome::Skipped(SkipReason::Api);
            }
        };

        let output_dir = job.output_dir.clone();
        let base = job.base_filename.clone();
        let written =
            tokio::task::spawn_blocking(move || write_audio(&output_dir, &base, index, &audio))
                .await;
        let path = match written {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                warn!("[调度] {}", e);
                return ChunkOutcome::Skipped(SkipReason::OutputWrite);
            }
            Err(e) => {
                warn!("[调度] 分块 {} 写文件任务异常退出: {}", index, e);
                return ChunkOutcome::Skipped(SkipReason::OutputWrite);
            }
        };

        let pool = Arc::clone(&self.pool);
        let key = credential.to_string();
        let char_count = request.char_count();
        match tokio::task::spawn_blocking(move || pool.record_usage(&key, char_count)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("[调度] 写入账本失败: {}", e),
            Err(e) => warn!("[调度] 记账任务异常退出: {}", e),
        }
        ChunkOutcome::Produced(path)
    }

    async fn pause(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.inter_chunk_delay) => {}
        }
    }
}
