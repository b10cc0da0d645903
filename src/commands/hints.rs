//! # hints 命令实现
//!
//! 解析 RUN_HINTS 并行配置提示，展示排名并按策略选取。
//!
//! ## 依赖关系
//! - 使用 `cli/hints.rs` 定义的参数
//! - 使用 `task/runmode.rs`, `utils/output.rs`

use tabled::{Table, Tabled};

use crate::cli::hints::HintsArgs;
use crate::error::Result;
use crate::task::RunHints;
use crate::utils::output;

/// 提示表格行
#[derive(Debug, Tabled)]
struct HintRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "CPUs")]
    tot_ncpus: u32,
    #[tabled(rename = "MPI")]
    mpi_ncpus: u32,
    #[tabled(rename = "OMP")]
    omp_ncpus: u32,
    #[tabled(rename = "Mem (GB)")]
    memory_gb: String,
    #[tabled(rename = "Weight")]
    weight: String,
}

/// 执行 hints 命令
pub fn execute(args: HintsArgs) -> Result<()> {
    output::print_header("Autoparallelization Hints");

    let hints = RunHints::from_file(&args.file)?;
    output::print_info(&format!(
        "Parsed {} candidate configurations from '{}'",
        hints.ranked().len(),
        args.file.display()
    ));

    let rows: Vec<HintRow> = hints
        .ranked()
        .iter()
        .enumerate()
        .map(|(i, h)| HintRow {
            rank: i + 1,
            tot_ncpus: h.tot_ncpus,
            mpi_ncpus: h.mpi_ncpus,
            omp_ncpus: h.omp_ncpus,
            memory_gb: format!("{:.1}", h.memory_gb),
            weight: format!("{:.3}", h.weight),
        })
        .collect();

    println!("{}", Table::new(&rows));

    match hints.select(args.policy, args.max_ncpus) {
        Some(hint) => {
            output::print_done(&format!(
                "Selected: {} CPUs ({} MPI x {} OMP), weight {:.3}",
                hint.tot_ncpus,
                hint.mpi_ncpus,
                hint.omp_ncpus.max(1),
                hint.weight
            ));
            if !hint.variables.is_empty() {
                let vars = hint
                    .variables
                    .iter()
                    .map(|(k, v)| format!("{} {}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                output::print_info(&format!("Suggested input variables: {}", vars));
            }
        }
        None => {
            output::print_warning(&format!(
                "No configuration fits within {} CPUs",
                args.max_ncpus
            ));
        }
    }

    Ok(())
}
