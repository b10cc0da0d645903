//! # results 命令实现
//!
//! 收集已完成任务的结果：总能量、费米能、事件计数，
//! 输出 CSV 排名表与可选的合并 JSON 报告。
//!
//! ## 功能
//! - 扫描任务目录并筛选完成者
//! - 解析主输出的能量与事件
//! - 按总能量排序输出
//!
//! ## 依赖关系
//! - 使用 `cli/results.rs` 定义的参数
//! - 使用 `batch/`, `abinit/output.rs`, `task/`
//! - 使用 `utils/output.rs`

use std::path::Path;

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::abinit::parse_output;
use crate::batch::{BatchRunner, TaskDirCollector};
use crate::cli::results::ResultsArgs;
use crate::error::{AbitoolError, Result};
use crate::task::task::basename;
use crate::task::{derive_status, EventKind, EventParser, TaskStatus};
use crate::utils::output;

/// 单个已完成任务的结果记录
#[derive(Debug, Clone, Serialize)]
struct ResultRecord {
    task: String,
    status: TaskStatus,
    etotal_ev: Option<f64>,
    fermi_ev: Option<f64>,
    version: Option<String>,
    n_comment: usize,
    n_warning: usize,
}

/// 结果表格行
#[derive(Debug, Tabled)]
struct ResultRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Etotal (eV)")]
    etotal: String,
    #[tabled(rename = "Fermi (eV)")]
    fermi: String,
    #[tabled(rename = "Warnings")]
    warnings: usize,
}

/// 执行 results 命令
pub fn execute(args: ResultsArgs) -> Result<()> {
    output::print_header("Collecting Task Results");

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

    let root = args.jobs_root.clone();
    let records = BatchRunner::new(args.jobs).run(&dirs, "Parsing", |dir| collect_dir(&root, dir));

    let mut done: Vec<ResultRecord> = Vec::new();
    let mut skipped = 0usize;
    for record in records {
        match record {
            Ok(Some(r)) => done.push(r),
            Ok(None) => skipped += 1,
            Err(e) => output::print_warning(&e.to_string()),
        }
    }

    if done.is_empty() {
        output::print_warning("No completed tasks found to collect.");
        return Ok(());
    }

    // 按总能量排序，缺失值排在最后
    done.sort_by(|a, b| match (a.etotal_ev, b.etotal_ev) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let rows: Vec<ResultRow> = done
        .iter()
        .enumerate()
        .map(|(i, r)| ResultRow {
            rank: i + 1,
            task: r.task.clone(),
            etotal: r
                .etotal_ev
                .map(|e| format!("{:.6}", e))
                .unwrap_or_else(|| "-".to_string()),
            fermi: r
                .fermi_ev
                .map(|e| format!("{:.6}", e))
                .unwrap_or_else(|| "-".to_string()),
            warnings: r.n_warning,
        })
        .collect();

    println!("{}", Table::new(&rows));

    save_results_csv(&done, &args.output_csv)?;
    output::print_success(&format!(
        "Summary saved to '{}'",
        args.output_csv.display()
    ));

    if let Some(ref json_path) = args.output_json {
        let text = serde_json::to_string_pretty(&done)?;
        std::fs::write(json_path, text).map_err(|e| AbitoolError::FileWriteError {
            path: json_path.display().to_string(),
            source: e,
        })?;
        output::print_success(&format!("JSON report saved to '{}'", json_path.display()));
    }

    output::print_done(&format!(
        "Collected {} completed tasks ({} not yet done)",
        done.len(),
        skipped
    ));

    Ok(())
}

/// 处理单个任务目录；未完成的返回 None
fn collect_dir(root: &Path, dir: &Path) -> Result<Option<ResultRecord>> {
    let output_file = dir.join(basename::OUTPUT);
    let log_file = dir.join(basename::LOG);
    let stderr_file = dir.join(basename::STDERR);

    let status = derive_status(&output_file, &log_file, &stderr_file)?;
    if status != TaskStatus::Done {
        return Ok(None);
    }

    let parsed = parse_output(&output_file)?;
    let events = EventParser::new().parse(&output_file)?;

    let task = dir
        .strip_prefix(root)
        .unwrap_or(dir)
        .display()
        .to_string();

    Ok(Some(ResultRecord {
        task,
        status,
        etotal_ev: parsed.etotal_ev,
        fermi_ev: parsed.fermi_ev,
        version: parsed.version,
        n_comment: events.count(EventKind::Comment),
        n_warning: events.count(EventKind::Warning),
    }))
}

/// 保存结果到 CSV
fn save_results_csv(records: &[ResultRecord], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path).map_err(AbitoolError::CsvError)?;

    wtr.write_record([
        "rank",
        "task",
        "status",
        "etotal_eV",
        "fermi_eV",
        "version",
        "n_comment",
        "n_warning",
    ])
    .map_err(AbitoolError::CsvError)?;

    for (i, r) in records.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            r.task.clone(),
            r.status.to_string(),
            r.etotal_ev.map(|e| format!("{:.10}", e)).unwrap_or_default(),
            r.fermi_ev.map(|e| format!("{:.10}", e)).unwrap_or_default(),
            r.version.clone().unwrap_or_default(),
            r.n_comment.to_string(),
            r.n_warning.to_string(),
        ])
        .map_err(AbitoolError::CsvError)?;
    }

    wtr.flush().map_err(|e| AbitoolError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
