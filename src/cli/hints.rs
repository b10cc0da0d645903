//! # hints 子命令 CLI 定义
//!
//! 解析并行配置提示并选取配置。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/hints.rs`

use clap::Args;
use std::path::PathBuf;

use crate::task::HintPolicy;

/// hints 子命令参数
#[derive(Args, Debug)]
pub struct HintsArgs {
    /// File containing a <RUN_HINTS> section (log or main output)
    pub file: PathBuf,

    /// Selection policy
    #[arg(long, value_enum, default_value = "default")]
    pub policy: HintPolicy,

    /// Maximum number of CPUs (0 = no limit)
    #[arg(long, default_value_t = 0)]
    pub max_ncpus: u32,
}
