//! # 任务状态
//!
//! 状态按需推导而非存储：由主输出的完成标志、日志/错误流文件的
//! 存在与内容、以及解析出的严重事件共同决定。按严重度排序，
//! 支持对一批任务取"最严重"的归约。
//!
//! ## 依赖关系
//! - 被 `task/task.rs`, `workflow/`, `commands/status.rs` 使用
//! - 使用 `task/events.rs`, `abinit/output.rs`

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::abinit::output_is_complete;
use crate::error::Result;
use crate::task::events::EventParser;

/// 任务状态，按严重度从低到高排列
///
/// 派生的 `Ord` 即严重度次序：waiting < done < running < error。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 尚未启动，或输出文件还不存在
    #[default]
    Waiting,
    /// 主输出已带完成标志（不保证结果正确）
    Done,
    /// 输出与日志已出现且无严重事件
    Running,
    /// 严重事件、非空 stderr 或非零退出码
    Error,
}

impl TaskStatus {
    /// 严重度等级
    pub fn rank(&self) -> u8 {
        match self {
            TaskStatus::Waiting => 1,
            TaskStatus::Done => 2,
            TaskStatus::Running => 4,
            TaskStatus::Error => 8,
        }
    }

    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }

    /// 一批任务中最严重的状态；空输入视为 waiting
    pub fn most_critical(statuses: impl IntoIterator<Item = TaskStatus>) -> TaskStatus {
        statuses
            .into_iter()
            .max()
            .unwrap_or(TaskStatus::Waiting)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Waiting => write!(f, "waiting"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// 从任务目录中的文件推导状态
///
/// 推导规则：
/// 1. 主输出带完成标志 → done
/// 2. 主输出与日志都存在 → 解析两者的事件；出现严重事件或
///    stderr 非空 → error，否则 running
/// 3. 输出文件缺失 → waiting（任务尚未真正启动）
pub fn derive_status(output_file: &Path, log_file: &Path, stderr_file: &Path) -> Result<TaskStatus> {
    if output_is_complete(output_file) {
        return Ok(TaskStatus::Done);
    }

    if output_file.exists() && log_file.exists() {
        let parser = EventParser::new();
        let main_events = parser.parse(output_file)?;
        let log_events = parser.parse(log_file)?;

        if main_events.has_critical() || log_events.has_critical() {
            return Ok(TaskStatus::Error);
        }

        let stderr_len = fs::metadata(stderr_file).map(|m| m.len()).unwrap_or(0);
        if stderr_len > 0 {
            return Ok(TaskStatus::Error);
        }

        return Ok(TaskStatus::Running);
    }

    Ok(TaskStatus::Waiting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_severity_order() {
        assert!(TaskStatus::Waiting < TaskStatus::Done);
        assert!(TaskStatus::Done < TaskStatus::Running);
        assert!(TaskStatus::Running < TaskStatus::Error);
    }

    #[test]
    fn test_ranks() {
        assert_eq!(TaskStatus::Waiting.rank(), 1);
        assert_eq!(TaskStatus::Done.rank(), 2);
        assert_eq!(TaskStatus::Running.rank(), 4);
        assert_eq!(TaskStatus::Error.rank(), 8);
    }

    #[test]
    fn test_most_critical() {
        let statuses = [TaskStatus::Done, TaskStatus::Running, TaskStatus::Waiting];
        assert_eq!(TaskStatus::most_critical(statuses), TaskStatus::Running);

        let with_error = [TaskStatus::Done, TaskStatus::Error];
        assert_eq!(TaskStatus::most_critical(with_error), TaskStatus::Error);

        assert_eq!(TaskStatus::most_critical([]), TaskStatus::Waiting);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Waiting.is_terminal());
    }

    #[test]
    fn test_derive_status_waiting_when_files_absent() {
        let dir = tempfile::tempdir().unwrap();
        let status = derive_status(
            &dir.path().join("run.output"),
            &dir.path().join("log"),
            &dir.path().join("stderr"),
        )
        .unwrap();
        assert_eq!(status, TaskStatus::Waiting);
    }

    #[test]
    fn test_derive_status_done_on_completion_marker() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.output");
        std::fs::write(&output, "results\n Calculation completed.\n").unwrap();

        let status = derive_status(&output, &dir.path().join("log"), &dir.path().join("stderr"))
            .unwrap();
        assert_eq!(status, TaskStatus::Done);
    }

    #[test]
    fn test_derive_status_running_without_events() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.output");
        let log = dir.path().join("log");
        std::fs::write(&output, "iteration 3\n").unwrap();
        std::fs::write(&log, "iteration 3\n").unwrap();

        let status = derive_status(&output, &log, &dir.path().join("stderr")).unwrap();
        assert_eq!(status, TaskStatus::Running);
    }

    #[test]
    fn test_derive_status_error_on_critical_event() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.output");
        let log = dir.path().join("log");
        std::fs::write(&output, "iteration 3\n").unwrap();
        std::fs::write(&log, "--- !ERROR\nsomething diverged\n").unwrap();

        let status = derive_status(&output, &log, &dir.path().join("stderr")).unwrap();
        assert_eq!(status, TaskStatus::Error);
    }

    #[test]
    fn test_derive_status_error_on_nonempty_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("run.output");
        let log = dir.path().join("log");
        let stderr = dir.path().join("stderr");
        std::fs::write(&output, "iteration 3\n").unwrap();
        std::fs::write(&log, "iteration 3\n").unwrap();
        let mut f = std::fs::File::create(&stderr).unwrap();
        writeln!(f, "segfault").unwrap();

        let status = derive_status(&output, &log, &stderr).unwrap();
        assert_eq!(status, TaskStatus::Error);
    }
}
