//! # status 命令实现
//!
//! 扫描任务目录，并行推导每个任务的状态，输出表格与
//! 整体（最严重）状态。
//!
//! ## 功能
//! - 按 run.files 判据收集任务目录
//! - rayon 并行状态推导
//! - 可选的事件计数列
//!
//! ## 依赖关系
//! - 使用 `cli/status.rs` 定义的参数
//! - 使用 `batch/`, `task/status.rs`, `task/events.rs`
//! - 使用 `utils/output.rs`

use std::path::{Path, PathBuf};

use tabled::{Table, Tabled};

use crate::batch::{BatchRunner, TaskDirCollector};
use crate::cli::status::StatusArgs;
use crate::error::{AbitoolError, Result};
use crate::task::task::basename;
use crate::task::{derive_status, EventKind, EventParser, TaskStatus};
use crate::utils::output;

/// 单个任务目录的扫描结果
struct Scan {
    dir: PathBuf,
    status: TaskStatus,
    warnings: usize,
    errors: usize,
}

/// 状态表格行
#[derive(Debug, Tabled)]
struct StatusRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// 带事件计数的表格行
#[derive(Debug, Tabled)]
struct EventRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Warnings")]
    warnings: usize,
    #[tabled(rename = "Errors")]
    errors: usize,
}

/// 执行 status 命令
pub fn execute(args: StatusArgs) -> Result<()> {
    output::print_header("Task Status");

    let dirs = TaskDirCollector::new(&args.jobs_root)
        .with_pattern(&args.pattern)?
        .recursive(!args.no_recurse)
        .collect()?;

    if dirs.is_empty() {
        return Err(AbitoolError::NoTasksFound {
            path: args.jobs_root.display().to_string(),
        });
    }

    output::print_info(&format!("Scanning {} task directories...", dirs.len()));

    let count_events = args.events;
    let scans = BatchRunner::new(args.jobs).run(&dirs, "Inspecting", |dir| scan_dir(dir, count_events));

    let mut failures = Vec::new();
    let mut results = Vec::new();
    for scan in scans {
        match scan {
            Ok(s) => results.push(s),
            Err(e) => failures.push(e.to_string()),
        }
    }

    // 严重的排在前面，同级按目录名
    results.sort_by(|a, b| {
        b.status
            .rank()
            .cmp(&a.status.rank())
            .then_with(|| a.dir.cmp(&b.dir))
    });

    if args.events {
        let rows: Vec<EventRow> = results
            .iter()
            .map(|s| EventRow {
                task: display_name(&args.jobs_root, &s.dir),
                status: s.status.to_string(),
                warnings: s.warnings,
                errors: s.errors,
            })
            .collect();
        println!("{}", Table::new(&rows));
    } else {
        let rows: Vec<StatusRow> = results
            .iter()
            .map(|s| StatusRow {
                task: display_name(&args.jobs_root, &s.dir),
                status: s.status.to_string(),
            })
            .collect();
        println!("{}", Table::new(&rows));
    }

    for failure in &failures {
        output::print_warning(failure);
    }

    let aggregate = TaskStatus::most_critical(results.iter().map(|s| s.status));
    output::print_separator();
    println!(
        "Most critical of {} tasks: {}",
        results.len(),
        output::colorize_status(aggregate)
    );

    Ok(())
}

/// 推导单个目录的状态与可选的事件计数
fn scan_dir(dir: &Path, count_events: bool) -> Result<Scan> {
    let output_file = dir.join(basename::OUTPUT);
    let log_file = dir.join(basename::LOG);
    let stderr_file = dir.join(basename::STDERR);

    let status = derive_status(&output_file, &log_file, &stderr_file)?;

    let (warnings, errors) = if count_events && output_file.exists() {
        let report = EventParser::new().parse(&output_file)?;
        (
            report.count(EventKind::Warning),
            report.count(EventKind::Error) + report.count(EventKind::Bug),
        )
    } else {
        (0, 0)
    };

    Ok(Scan {
        dir: dir.to_path_buf(),
        status,
        warnings,
        errors,
    })
}

/// 相对 jobs 根的易读名称
fn display_name(root: &Path, dir: &Path) -> String {
    dir.strip_prefix(root)
        .unwrap_or(dir)
        .display()
        .to_string()
}
