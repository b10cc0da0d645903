//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `task/`, `workflow/`, `abinit/`, `models/`, `utils/`
//! - 子模块: run, status, results, bands, hints

pub mod bands;
pub mod hints;
pub mod results;
pub mod run;
pub mod status;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Run(args) => run::execute(args),
        Commands::Status(args) => status::execute(args),
        Commands::Results(args) => results::execute(args),
        Commands::Bands(args) => bands::execute(args),
        Commands::Hints(args) => hints::execute(args),
    }
}
