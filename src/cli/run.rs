//! # run 子命令 CLI 定义
//!
//! 装配并启动 ABINIT 工作流。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/run.rs`

use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::task::{HintPolicy, LauncherKind};

/// 工作流种类
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Ground-state SCF only
    Scf,
    /// SCF + band structure along a high-symmetry path
    Bands,
    /// SCF + NSCF + screening + self-energy (G0W0)
    Gw,
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowKind::Scf => write!(f, "scf"),
            WorkflowKind::Bands => write!(f, "bands"),
            WorkflowKind::Gw => write!(f, "gw"),
        }
    }
}

/// run 子命令参数
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Structure input file (POSCAR/CONTCAR)
    pub structure: PathBuf,

    /// Workflow to build
    #[arg(long, value_enum, default_value = "scf")]
    pub workflow: WorkflowKind,

    /// Root directory for the workflow
    #[arg(long, default_value = "jobs")]
    pub workdir: PathBuf,

    // ─────────────────────────────────────────────────────────────
    // Pseudopotentials
    // ─────────────────────────────────────────────────────────────
    /// Directory containing pseudopotential files named <El>.<ext>
    #[arg(long)]
    pub pseudo_dir: PathBuf,

    /// Pseudopotential file extension
    #[arg(long, default_value = "psp8")]
    pub pseudo_ext: String,

    // ─────────────────────────────────────────────────────────────
    // Calculation parameters
    // ─────────────────────────────────────────────────────────────
    /// Plane-wave cutoff energy (Ha)
    #[arg(long, default_value_t = 15.0)]
    pub ecut: f64,

    /// SCF k-point grid (e.g., '4,4,4')
    #[arg(long, default_value = "4,4,4")]
    pub ngkpt: String,

    /// Number of bands for the NSCF step
    #[arg(long, default_value_t = 12)]
    pub nband: u32,

    /// Divisions of the smallest k-path segment (bands workflow)
    #[arg(long, default_value_t = 10)]
    pub ndivsm: u32,

    /// Screening matrix cutoff (Ha, gw workflow)
    #[arg(long, default_value_t = 6.0)]
    pub ecuteps: f64,

    /// Exchange self-energy cutoff (Ha, gw workflow)
    #[arg(long, default_value_t = 12.0)]
    pub ecutsigx: f64,

    // ─────────────────────────────────────────────────────────────
    // Run mode
    // ─────────────────────────────────────────────────────────────
    /// Launcher kind
    #[arg(long, value_enum, default_value = "shell")]
    pub launcher: LauncherKind,

    /// Parallel-configuration selection policy
    #[arg(long, value_enum, default_value = "default")]
    pub policy: HintPolicy,

    /// Maximum number of CPUs (0 = no limit)
    #[arg(long, default_value_t = 0)]
    pub max_ncpus: u32,

    /// OpenMP thread count (0 = OMP unused)
    #[arg(long, default_value_t = 0)]
    pub omp_numthreads: u32,

    /// Tasks launched per batch when no queue manager is used
    #[arg(long, default_value_t = 1)]
    pub chunk_size: usize,

    /// Read the run mode from a JSON file instead of the flags above
    #[arg(long)]
    pub runmode_file: Option<PathBuf>,

    // ─────────────────────────────────────────────────────────────
    // Queue options
    // ─────────────────────────────────────────────────────────────
    /// Scheduler partition/queue
    #[arg(long, default_value = "normal")]
    pub partition: String,

    /// Time limit (e.g., '24:00:00')
    #[arg(long, default_value = "24:00:00")]
    pub time: String,

    /// Memory per CPU
    #[arg(long, default_value = "3G")]
    pub mem_per_cpu: String,

    /// Module list (comma-separated)
    #[arg(long, default_value = "")]
    pub modules: String,

    // ─────────────────────────────────────────────────────────────
    // Provenance
    // ─────────────────────────────────────────────────────────────
    /// Authors recorded in the provenance file ("Name <email>, ...")
    #[arg(long, default_value = "abitool user <user@localhost>")]
    pub authors: String,

    // ─────────────────────────────────────────────────────────────
    // Execution control
    // ─────────────────────────────────────────────────────────────
    /// Only write directories and input files, do not launch
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
