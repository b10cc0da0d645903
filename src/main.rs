//! # abitool - ABINIT 工作流统一工具箱
//!
//! 驱动外部 ABINIT 程序的编排层：生成输入、启动/提交任务、
//! 从输出日志推导状态、串联任务间数据依赖、做结果后处理。
//!
//! ## 子命令
//! - `run`     - 装配并启动工作流 (scf / bands / gw)
//! - `status`  - 扫描任务目录并汇报状态
//! - `results` - 收集已完成任务的结果
//! - `bands`   - 能带结构分析
//! - `hints`   - 并行配置提示选取
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── task/      (任务执行内核)
//!   │     ├── workflow/  (工作流与工厂)
//!   │     ├── abinit/    (输入生成与输出解析)
//!   │     ├── parsers/   (结构文件解析)
//!   │     └── models/    (数据模型)
//!   ├── batch/      (并行目录扫描)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod abinit;
mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod task;
mod utils;
mod workflow;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
