//! # status 子命令 CLI 定义
//!
//! 扫描任务目录并汇报状态。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/status.rs`

use clap::Args;
use std::path::PathBuf;

/// status 子命令参数
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Root directory containing task directories
    #[arg(default_value = "jobs")]
    pub jobs_root: PathBuf,

    /// Glob pattern for task directory names (comma-separated)
    #[arg(long, default_value = "*")]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Do not recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub no_recurse: bool,

    /// Also report event counts per task
    #[arg(long, default_value_t = false)]
    pub events: bool,
}
