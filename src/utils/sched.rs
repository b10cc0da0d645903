//! # 调度器脚本生成工具
//!
//! 生成 sbatch (Slurm) 与 qsub (PBS) 提交脚本。
//!
//! ## 依赖关系
//! - 被 `task/launcher.rs` 使用
//! - 无外部模块依赖

use std::path::Path;

/// 调度器作业配置
pub struct SchedulerConfig {
    pub job_name: String,
    pub partition: String,
    pub nodes: u32,
    pub ntasks: u32,
    pub cpus_per_task: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
    pub omp_numthreads: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            job_name: "job".to_string(),
            partition: "normal".to_string(),
            nodes: 1,
            ntasks: 1,
            cpus_per_task: 1,
            mem_per_cpu: "3G".to_string(),
            time_limit: "24:00:00".to_string(),
            modules: vec![],
            omp_numthreads: 0,
        }
    }
}

impl SchedulerConfig {
    fn module_loads(&self) -> String {
        self.modules
            .iter()
            .map(|m| format!("module load {}", m))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn omp_export(&self) -> String {
        if self.omp_numthreads > 0 {
            format!("export OMP_NUM_THREADS={}", self.omp_numthreads)
        } else {
            String::new()
        }
    }
}

/// 生成 sbatch 脚本内容
pub fn generate_sbatch_script(config: &SchedulerConfig, workdir: &Path, exec_cmd: &str) -> String {
    format!(
        r#"#!/bin/bash
#SBATCH --partition {}
#SBATCH --nodes={}
#SBATCH --mem-per-cpu {}
#SBATCH --time {}
#SBATCH -c {}
#SBATCH -n {}
#SBATCH -J {}
#SBATCH -o sched_logs/%x.out
#SBATCH -e sched_logs/%x.err

set -euo pipefail

module purge 2>&1
{}
{}

cd "{}"
echo "PWD=$(pwd)"
echo "Running: {}"
{}
"#,
        config.partition,
        config.nodes,
        config.mem_per_cpu,
        config.time_limit,
        config.cpus_per_task,
        config.ntasks,
        config.job_name,
        config.module_loads(),
        config.omp_export(),
        workdir.display(),
        exec_cmd,
        exec_cmd,
    )
}

/// 生成 qsub 脚本内容
pub fn generate_qsub_script(config: &SchedulerConfig, workdir: &Path, exec_cmd: &str) -> String {
    format!(
        r#"#!/bin/bash
#PBS -N {}
#PBS -q {}
#PBS -l nodes={}:ppn={}
#PBS -l walltime={}
#PBS -o sched_logs/{}.out
#PBS -e sched_logs/{}.err

set -euo pipefail

module purge 2>&1
{}
{}

cd "{}"
echo "PWD=$(pwd)"
echo "Running: {}"
{}
"#,
        config.job_name,
        config.partition,
        config.nodes,
        config.ntasks,
        config.time_limit,
        config.job_name,
        config.job_name,
        config.module_loads(),
        config.omp_export(),
        workdir.display(),
        exec_cmd,
        exec_cmd,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sbatch_script_headers() {
        let config = SchedulerConfig {
            job_name: "scf".to_string(),
            partition: "compute".to_string(),
            ntasks: 32,
            modules: vec!["abinit/9.6".to_string()],
            omp_numthreads: 2,
            ..SchedulerConfig::default()
        };

        let script = generate_sbatch_script(&config, Path::new("/work/scf"), "mpirun abinit");
        assert!(script.starts_with("#!/bin/bash"));
        assert!(script.contains("#SBATCH --partition compute"));
        assert!(script.contains("#SBATCH -n 32"));
        assert!(script.contains("#SBATCH -J scf"));
        assert!(script.contains("module load abinit/9.6"));
        assert!(script.contains("export OMP_NUM_THREADS=2"));
        assert!(script.contains("cd \"/work/scf\""));
    }

    #[test]
    fn test_qsub_script_headers() {
        let config = SchedulerConfig {
            job_name: "nscf".to_string(),
            nodes: 2,
            ntasks: 16,
            ..SchedulerConfig::default()
        };

        let script = generate_qsub_script(&config, Path::new("/work/nscf"), "mpirun abinit");
        assert!(script.contains("#PBS -N nscf"));
        assert!(script.contains("#PBS -l nodes=2:ppn=16"));
        assert!(script.contains("walltime=24:00:00"));
    }

    #[test]
    fn test_no_omp_export_when_unused() {
        let config = SchedulerConfig::default();
        let script = generate_sbatch_script(&config, Path::new("/w"), "abinit");
        assert!(!script.contains("OMP_NUM_THREADS"));
    }
}
