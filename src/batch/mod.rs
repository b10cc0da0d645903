//! # 批量处理模块
//!
//! 提供任务目录的收集与并行处理能力。
//!
//! ## 功能
//! - 按 run.files 判据收集任务目录
//! - 名称模式过滤、递归搜索
//! - rayon 并行处理与进度反馈
//!
//! ## 依赖关系
//! - 被 `commands/status.rs`, `commands/results.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::{is_task_dir, TaskDirCollector};
pub use runner::BatchRunner;
