//! # results 子命令 CLI 定义
//!
//! 收集已完成任务的结果。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/results.rs`

use clap::Args;
use std::path::PathBuf;

/// results 子命令参数
#[derive(Args, Debug)]
pub struct ResultsArgs {
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

    /// Filename for the CSV summary
    #[arg(long, default_value = "task_results.csv")]
    pub output_csv: PathBuf,

    /// Optional path for a merged JSON report
    #[arg(long)]
    pub output_json: Option<PathBuf>,
}
