//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `run`: 装配并启动 ABINIT 工作流
//! - `status`: 扫描任务目录并汇报状态
//! - `results`: 收集已完成任务的结果
//! - `bands`: 从主输出解析并分析能带结构
//! - `hints`: 解析并行配置提示并选取配置
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: run, status, results, bands, hints

pub mod bands;
pub mod hints;
pub mod results;
pub mod run;
pub mod status;

use clap::{Parser, Subcommand};

/// abitool - ABINIT 工作流统一工具箱
#[derive(Parser)]
#[command(name = "abitool")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "A unified ABINIT workflow toolkit", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Build and launch an ABINIT workflow (scf / bands / gw)
    Run(run::RunArgs),

    /// Scan task directories and report their status
    Status(status::StatusArgs),

    /// Collect result bundles from completed tasks
    Results(results::ResultsArgs),

    /// Analyze a band structure from an ABINIT main output
    Bands(bands::BandsArgs),

    /// Parse autoparallelization hints and select a configuration
    Hints(hints::HintsArgs),
}
