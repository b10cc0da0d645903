//! # 美化输出工具
//!
//! 提供统一的终端输出样式，包括任务状态着色。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored` crate

use colored::Colorize;

use crate::task::TaskStatus;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 按严重度着色的状态标签
pub fn colorize_status(status: TaskStatus) -> String {
    let label = status.to_string();
    match status {
        TaskStatus::Waiting => label.dimmed().to_string(),
        TaskStatus::Done => label.green().bold().to_string(),
        TaskStatus::Running => label.cyan().bold().to_string(),
        TaskStatus::Error => label.red().bold().to_string(),
    }
}

/// 打印单个任务的状态行
pub fn print_task_status(name: &str, status: TaskStatus) {
    println!("{:<40} {}", name, colorize_status(status));
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}
