//! # 运行模式与并行配置提示
//!
//! `RunMode`：用户侧的执行配置包（启动器种类、调度策略、CPU 上限、
//! OpenMP 线程数、队列参数、分块大小），可从 JSON 文件加载并补全
//! 默认值。`RunHints`：程序自报的并行配置候选表，按效率权重排序，
//! 依策略与 CPU 上限选取。
//!
//! ## 依赖关系
//! - 被 `task/`, `workflow/`, `commands/` 使用
//! - 使用 `serde_json`

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AbitoolError, Result};

/// 启动器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LauncherKind {
    /// 直接在本机 shell 中执行
    #[default]
    Shell,
    /// 生成 sbatch 脚本并提交 Slurm
    Slurm,
    /// 生成 qsub 脚本并提交 PBS
    Pbs,
}

impl std::fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LauncherKind::Shell => write!(f, "shell"),
            LauncherKind::Slurm => write!(f, "slurm"),
            LauncherKind::Pbs => write!(f, "pbs"),
        }
    }
}

/// 并行配置的选取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HintPolicy {
    /// 权重最接近 1.0 的配置
    #[default]
    Default,
    /// 权重容差内 CPU 数最大的配置
    MaxNcpus,
}

/// 队列管理器参数（sbatch/qsub 脚本生成用）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueParams {
    pub partition: String,
    pub nodes: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
}

impl Default for QueueParams {
    fn default() -> Self {
        QueueParams {
            partition: "normal".to_string(),
            nodes: 1,
            mem_per_cpu: "3G".to_string(),
            time_limit: "24:00:00".to_string(),
            modules: vec![],
        }
    }
}

/// 执行配置包；构造后不再变更
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunMode {
    /// 启动器种类
    pub launcher: LauncherKind,

    /// 并行配置选取策略
    pub policy: HintPolicy,

    /// 可用 CPU 上限；0 表示不限制
    pub max_ncpus: u32,

    /// OpenMP 线程数；0 表示不使用 OMP
    pub omp_numthreads: u32,

    /// 无队列管理器时每批启动的任务数
    pub chunk_size: usize,

    /// 队列管理器参数
    pub queue_params: QueueParams,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode {
            launcher: LauncherKind::Shell,
            policy: HintPolicy::Default,
            max_ncpus: 0,
            omp_numthreads: 0,
            chunk_size: 1,
            queue_params: QueueParams::default(),
        }
    }
}

impl RunMode {
    /// 顺序执行模式
    pub fn sequential(chunk_size: usize, launcher: Option<LauncherKind>) -> Self {
        RunMode {
            chunk_size,
            launcher: launcher.unwrap_or(LauncherKind::Shell),
            ..RunMode::default()
        }
    }

    /// 从 JSON 配置文件加载；缺失字段取默认值
    pub fn from_file(path: &Path) -> Result<RunMode> {
        let text = fs::read_to_string(path).map_err(|e| AbitoolError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// 是否由资源管理器接管提交
    pub fn has_queue_manager(&self) -> bool {
        !matches!(self.launcher, LauncherKind::Shell)
    }

    /// 分块大小；有队列管理器时整批交付，返回 None
    pub fn chunk_size(&self) -> Option<usize> {
        if self.has_queue_manager() {
            None
        } else {
            Some(self.chunk_size.max(1))
        }
    }
}

/// 单个并行配置候选
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHint {
    /// 总 CPU 数
    pub tot_ncpus: u32,

    /// MPI 进程数
    pub mpi_ncpus: u32,

    /// OMP 线程数；0 表示未使用
    #[serde(default)]
    pub omp_ncpus: u32,

    /// 估计内存需求 (GB)
    #[serde(default)]
    pub memory_gb: f64,

    /// 效率权重；1.0 为期望最优
    pub weight: f64,

    /// 需要加入输入的额外变量
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
}

impl RunHint {
    /// 与最优权重 1.0 的距离
    fn weight_distance(&self) -> f64 {
        (self.weight - 1.0).abs()
    }
}

/// `max-ncpus` 策略允许的权重距离容差
const HINT_WEIGHT_TOL: f64 = 0.25;

/// 程序自报的并行配置候选表
///
/// ```text
/// <RUN_HINTS, max_ncpus = "108", autoparal="3">
/// { "1": {"tot_ncpus": 2, "mpi_ncpus": 2, "omp_ncpus": 1,
///         "memory_gb": 10, "weight": 0.4, "variables": {}} }
/// </RUN_HINTS>
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHints {
    /// 候选列表，按权重距离升序
    hints: Vec<RunHint>,
}

impl RunHints {
    /// 从文件读取 <RUN_HINTS> 节；假定文件只含一节
    pub fn from_file(path: &Path) -> Result<RunHints> {
        let text = fs::read_to_string(path).map_err(|e| AbitoolError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        let lines: Vec<&str> = text.lines().collect();

        let start = lines
            .iter()
            .position(|l| l.trim_start().starts_with("<RUN_HINTS"))
            .ok_or_else(|| AbitoolError::ParseError {
                format: "RUN_HINTS".to_string(),
                path: path.display().to_string(),
                reason: "No <RUN_HINTS> section found".to_string(),
            })?;
        let stop = lines
            .iter()
            .position(|l| l.trim_start().starts_with("</RUN_HINTS>"))
            .ok_or_else(|| AbitoolError::ParseError {
                format: "RUN_HINTS".to_string(),
                path: path.display().to_string(),
                reason: "Unterminated <RUN_HINTS> section".to_string(),
            })?;

        let body = lines[start + 1..stop].join("\n");
        Self::from_json_body(&body)
    }

    /// 解析节内的 JSON 候选表
    pub fn from_json_body(body: &str) -> Result<RunHints> {
        let table: BTreeMap<String, RunHint> = serde_json::from_str(body)?;

        let mut hints: Vec<RunHint> = table.into_values().collect();
        hints.sort_by(|a, b| {
            a.weight_distance()
                .partial_cmp(&b.weight_distance())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(RunHints { hints })
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    /// 全部候选，按权重距离升序
    pub fn ranked(&self) -> &[RunHint] {
        &self.hints
    }

    /// 依策略与 CPU 上限选取配置
    ///
    /// 先滤除超出 `max_ncpus` 的候选（0 表示不限制），再按策略挑选。
    pub fn select(&self, policy: HintPolicy, max_ncpus: u32) -> Option<&RunHint> {
        let candidates: Vec<&RunHint> = self
            .hints
            .iter()
            .filter(|h| max_ncpus == 0 || h.tot_ncpus <= max_ncpus)
            .collect();

        let best = *candidates.first()?;

        match policy {
            HintPolicy::Default => Some(best),
            HintPolicy::MaxNcpus => {
                let cutoff = best.weight_distance() + HINT_WEIGHT_TOL;
                candidates
                    .iter()
                    .filter(|h| h.weight_distance() <= cutoff)
                    .max_by_key(|h| h.tot_ncpus)
                    .copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HINTS_BODY: &str = r#"{
        "1": {"tot_ncpus": 108, "mpi_ncpus": 108, "omp_ncpus": 1, "memory_gb": 27.0, "weight": 27.0},
        "2": {"tot_ncpus": 96,  "mpi_ncpus": 96,  "omp_ncpus": 1, "memory_gb": 12.0, "weight": 1.5},
        "3": {"tot_ncpus": 84,  "mpi_ncpus": 84,  "omp_ncpus": 1, "memory_gb": 10.0, "weight": 0.8},
        "4": {"tot_ncpus": 64,  "mpi_ncpus": 64,  "omp_ncpus": 1, "memory_gb": 8.0,  "weight": 0.95}
    }"#;

    #[test]
    fn test_runmode_defaults() {
        let mode = RunMode::default();
        assert_eq!(mode.launcher, LauncherKind::Shell);
        assert!(!mode.has_queue_manager());
        assert_eq!(mode.chunk_size(), Some(1));
        assert_eq!(mode.max_ncpus, 0);
    }

    #[test]
    fn test_queue_manager_hands_off_whole_batches() {
        let mode = RunMode {
            launcher: LauncherKind::Slurm,
            ..RunMode::default()
        };
        assert!(mode.has_queue_manager());
        assert_eq!(mode.chunk_size(), None);
    }

    #[test]
    fn test_runmode_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"launcher": "slurm", "max_ncpus": 64}}"#).unwrap();

        let mode = RunMode::from_file(file.path()).unwrap();
        assert_eq!(mode.launcher, LauncherKind::Slurm);
        assert_eq!(mode.max_ncpus, 64);
        // 未给出的字段取默认值
        assert_eq!(mode.chunk_size, 1);
        assert_eq!(mode.queue_params.time_limit, "24:00:00");
    }

    #[test]
    fn test_hints_ranked_by_weight_distance() {
        let hints = RunHints::from_json_body(HINTS_BODY).unwrap();
        let ranked = hints.ranked();

        // weight 0.95 最接近 1.0，其后 0.8、1.5、27.0
        assert_eq!(ranked[0].tot_ncpus, 64);
        assert_eq!(ranked[1].tot_ncpus, 84);
        assert_eq!(ranked[2].tot_ncpus, 96);
        assert_eq!(ranked[3].tot_ncpus, 108);
    }

    #[test]
    fn test_select_default_policy() {
        let hints = RunHints::from_json_body(HINTS_BODY).unwrap();
        let hint = hints.select(HintPolicy::Default, 0).unwrap();
        assert_eq!(hint.tot_ncpus, 64);
    }

    #[test]
    fn test_select_respects_cpu_ceiling() {
        let hints = RunHints::from_json_body(HINTS_BODY).unwrap();
        // 96 与 108 被上限滤除后，0.95 仍是最优
        let hint = hints.select(HintPolicy::Default, 90).unwrap();
        assert_eq!(hint.tot_ncpus, 64);

        // 上限低于所有候选时无解
        assert!(hints.select(HintPolicy::Default, 32).is_none());
    }

    #[test]
    fn test_select_max_ncpus_policy() {
        let hints = RunHints::from_json_body(HINTS_BODY).unwrap();
        // 0.95 与 0.8 的权重距离都在容差内，取 CPU 较多者 84
        let hint = hints.select(HintPolicy::MaxNcpus, 90).unwrap();
        assert_eq!(hint.tot_ncpus, 84);
    }

    #[test]
    fn test_hints_from_file_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "some preamble").unwrap();
        writeln!(file, "<RUN_HINTS, max_ncpus = \"108\", autoparal=\"3\">").unwrap();
        writeln!(file, "{}", HINTS_BODY).unwrap();
        writeln!(file, "</RUN_HINTS>").unwrap();

        let hints = RunHints::from_file(file.path()).unwrap();
        assert_eq!(hints.ranked().len(), 4);
    }

    #[test]
    fn test_hints_missing_section_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "no hints here").unwrap();
        assert!(RunHints::from_file(file.path()).is_err());
    }
}
