//! 任务事件与状态

use std::fmt;
use std::path::PathBuf;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    Exhausted,
    Cancelled,
}

impl JobState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// 任务结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 所有分块都已处理
    Completed,
    /// 没有可用凭证
    Exhausted,
    /// 用户取消
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StopReason> for JobState {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Completed => Self::Completed,
            StopReason::Exhausted => Self::Exhausted,
            StopReason::Cancelled => Self::Cancelled,
        }
    }
}

/// 任务向前端推送的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// 已完成分块数 / 总分块数
    Progress { done: usize, total: usize },
    /// 一行日志
    LogLine { text: String },
    /// 任务结束，之后不会再有事件
    JobEnded { reason: StopReason },
}

/// 任务结束报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub reason: StopReason,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub skipped_chunks: usize,
    /// 实际写入的音频文件，按分块顺序
    pub outputs: Vec<PathBuf>,
}

impl JobReport {
    pub(crate) fn new(total_chunks: usize) -> Self {
        Self {
            reason: StopReason::Completed,
            total_chunks,
            completed_chunks: 0,
            skipped_chunks: 0,
            outputs: Vec::new(),
        }
    }

    /// 未处理的分块数（取消或凭证耗尽后剩下的）
    pub fn remaining_chunks(&self) -> usize {
        self.total_chunks
            .saturating_sub(self.completed_chunks + self.skipped_chunks)
    }
}
