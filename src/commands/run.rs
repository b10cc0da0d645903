//! # run 命令实现
//!
//! 从结构文件装配 ABINIT 工作流并按运行模式启动。
//!
//! ## 功能
//! - 解析 POSCAR 结构
//! - 按元素种类定位赝势
//! - 装配 scf/bands/gw 工作流
//! - 写出溯源记录 (snl.json)
//! - shell 分块执行或整批提交队列
//!
//! ## 依赖关系
//! - 使用 `cli/run.rs` 定义的参数
//! - 使用 `parsers/poscar.rs`, `workflow/calculations.rs`
//! - 使用 `models/snl.rs`, `utils/output.rs`

use std::path::PathBuf;

use serde_json::json;

use crate::cli::run::{RunArgs, WorkflowKind};
use crate::error::{AbitoolError, Result};
use crate::models::snl::{Author, HistoryNode, StructureNl};
use crate::models::Crystal;
use crate::parsers;
use crate::task::{QueueParams, RunMode, TaskStatus};
use crate::utils::output;
use crate::workflow::calculations;
use crate::workflow::Workflow;

/// 执行 run 命令
pub fn execute(args: RunArgs) -> Result<()> {
    output::print_header("Workflow Launch");

    // 验证结构文件
    if !args.structure.exists() {
        return Err(AbitoolError::FileNotFound {
            path: args.structure.display().to_string(),
        });
    }

    let crystal = parsers::parse_structure_file(&args.structure)?;
    output::print_info(&format!(
        "Parsed structure '{}' ({}, {} atoms)",
        crystal.name,
        crystal.formula(),
        crystal.atoms.len()
    ));

    // 定位赝势
    let pseudos = find_pseudos(&args, &crystal)?;
    output::print_info(&format!("Using {} pseudopotential(s)", pseudos.len()));

    // 运行模式
    let runmode = build_runmode(&args)?;
    output::print_info(&format!(
        "Run mode: launcher={}, chunk={:?}, max_ncpus={}",
        runmode.launcher,
        runmode.chunk_size(),
        runmode.max_ncpus
    ));

    let ngkpt = parse_ngkpt(&args.ngkpt)?;

    // 工作流根目录：jobs/<结构名>
    let wf_root = args.workdir.join(sanitize(&crystal.name));

    let mut workflow = build_workflow(&args, &runmode, &crystal, &pseudos, ngkpt, &wf_root)?;

    workflow.build()?;
    output::print_success(&format!(
        "Generated {} task(s) under '{}'",
        workflow.len(),
        wf_root.display()
    ));

    write_provenance(&args, &crystal, &wf_root)?;

    if args.dry_run {
        output::print_info("[DRY] Inputs written, nothing launched");
        return Ok(());
    }

    if runmode.has_queue_manager() {
        workflow.start()?;
        output::print_done(&format!(
            "Submitted {} task(s) to the {} queue",
            workflow.len(),
            runmode.launcher
        ));
        output::print_info(&format!(
            "Current workflow status: {}",
            workflow.inspect()?
        ));
        return Ok(());
    }

    // shell 模式：分块执行直至全部结束
    let spinner = crate::utils::progress::create_spinner("Running tasks");
    workflow.start()?;
    spinner.finish_and_clear();

    output::print_separator();
    for (name, status) in workflow.task_statuses() {
        output::print_task_status(&name, status);
    }

    // 已完成任务的结果包随任务目录存档
    match workflow.get_results() {
        Ok(bundles) => {
            for results in bundles {
                let path = std::path::Path::new(&results.task_name).join("task_results.json");
                results.json_dump(&path)?;
            }
        }
        Err(e) => output::print_warning(&format!("Could not archive results: {}", e)),
    }

    let aggregate = workflow.status();
    match aggregate {
        TaskStatus::Done => output::print_done("All tasks completed"),
        other => output::print_warning(&format!("Workflow finished with status: {}", other)),
    }

    Ok(())
}

/// 按元素种类在 pseudo_dir 中定位赝势文件
fn find_pseudos(args: &RunArgs, crystal: &Crystal) -> Result<Vec<PathBuf>> {
    if !args.pseudo_dir.is_dir() {
        return Err(AbitoolError::DirectoryNotFound {
            path: args.pseudo_dir.display().to_string(),
        });
    }

    crystal
        .species()
        .iter()
        .map(|element| {
            let candidate = args
                .pseudo_dir
                .join(format!("{}.{}", element, args.pseudo_ext));
            if candidate.is_file() {
                Ok(candidate)
            } else {
                Err(AbitoolError::PseudoNotFound {
                    element: element.clone(),
                    path: candidate.display().to_string(),
                })
            }
        })
        .collect()
}

/// 从 CLI 参数或 JSON 文件构造运行模式
fn build_runmode(args: &RunArgs) -> Result<RunMode> {
    if let Some(ref path) = args.runmode_file {
        return RunMode::from_file(path);
    }

    let modules: Vec<String> = args
        .modules
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    Ok(RunMode {
        launcher: args.launcher,
        policy: args.policy,
        max_ncpus: args.max_ncpus,
        omp_numthreads: args.omp_numthreads,
        chunk_size: args.chunk_size,
        queue_params: QueueParams {
            partition: args.partition.clone(),
            mem_per_cpu: args.mem_per_cpu.clone(),
            time_limit: args.time.clone(),
            modules,
            ..QueueParams::default()
        },
    })
}

/// 解析 '4,4,4' 形式的 k 网格
fn parse_ngkpt(expr: &str) -> Result<[u32; 3]> {
    let parts: Vec<u32> = expr
        .split(',')
        .map(|s| s.trim().parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| AbitoolError::InvalidArgument(format!("Bad k-grid '{}'", expr)))?;

    if parts.len() != 3 || parts.contains(&0) {
        return Err(AbitoolError::InvalidArgument(format!(
            "k-grid needs three positive values, got '{}'",
            expr
        )));
    }

    Ok([parts[0], parts[1], parts[2]])
}

fn build_workflow(
    args: &RunArgs,
    runmode: &RunMode,
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ngkpt: [u32; 3],
    wf_root: &std::path::Path,
) -> Result<Workflow> {
    match args.workflow {
        WorkflowKind::Scf => calculations::scf_calculation(
            wf_root,
            runmode.clone(),
            crystal,
            pseudos,
            args.ecut,
            ngkpt,
        ),
        WorkflowKind::Bands => calculations::bandstructure(
            wf_root,
            runmode.clone(),
            crystal,
            pseudos,
            args.ecut,
            ngkpt,
            args.nband,
            args.ndivsm,
        ),
        WorkflowKind::Gw => calculations::g0w0(
            wf_root,
            runmode.clone(),
            crystal,
            pseudos,
            args.ecut,
            ngkpt,
            args.nband,
            args.ecuteps,
            args.ecutsigx,
        ),
    }
}

/// 写出结构的溯源记录
fn write_provenance(args: &RunArgs, crystal: &Crystal, wf_root: &std::path::Path) -> Result<()> {
    let authors = Author::parse_list(&args.authors)?;

    let history = vec![HistoryNode::new(
        "abitool",
        "https://github.com/Darkatse/abitool",
        json!({
            "action": "run",
            "workflow": args.workflow.to_string(),
            "structure_file": args.structure.display().to_string(),
        }),
    )];

    let snl = StructureNl::new(
        crystal.clone(),
        authors,
        vec![],
        String::new(),
        vec![],
        json!({
            "_abitool": {
                "ecut": args.ecut,
                "ngkpt": args.ngkpt,
                "workflow": args.workflow.to_string(),
            }
        }),
        history,
        None,
    )?;

    let path = wf_root.join("snl.json");
    std::fs::write(&path, snl.to_json()?).map_err(|e| AbitoolError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    output::print_info(&format!("Provenance record written to '{}'", path.display()));
    Ok(())
}

/// 目录名安全化：空白与路径分隔符替换为下划线
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ngkpt() {
        assert_eq!(parse_ngkpt("4,4,4").unwrap(), [4, 4, 4]);
        assert_eq!(parse_ngkpt(" 2, 3 ,4 ").unwrap(), [2, 3, 4]);
        assert!(parse_ngkpt("4,4").is_err());
        assert!(parse_ngkpt("4,0,4").is_err());
        assert!(parse_ngkpt("a,b,c").is_err());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Si2 bulk"), "Si2_bulk");
        assert_eq!(sanitize("Na/Cl"), "Na_Cl");
    }
}
