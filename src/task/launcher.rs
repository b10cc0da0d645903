//! # 任务启动器
//!
//! 负责把一个已构建好的任务真正跑起来：shell 模式写出 job.sh
//! 并在子进程中执行（stdout/stderr 重定向到任务目录内的 log 与
//! stderr）；slurm/pbs 模式生成调度器脚本并调用 sbatch/qsub 提交。
//!
//! ## 依赖关系
//! - 被 `task/task.rs` 使用
//! - 使用 `task/runmode.rs`, `utils/sched.rs`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::{AbitoolError, Result};
use crate::task::runmode::{LauncherKind, RunMode};
use crate::utils::sched::{generate_qsub_script, generate_sbatch_script, SchedulerConfig};

/// 默认的 ABINIT 可执行文件名
pub const DEFAULT_EXECUTABLE: &str = "abinit";

/// 调度器脚本的文件名
const SBATCH_SCRIPT: &str = "submit.sbatch";
const QSUB_SCRIPT: &str = "submit.qsub";

/// 任务启动器：从任务布局和运行模式得到执行方式
#[derive(Debug, Clone)]
pub struct TaskLauncher {
    workdir: PathBuf,
    job_name: String,
    files_file: PathBuf,
    log_file: PathBuf,
    stderr_file: PathBuf,
    jobfile: PathBuf,
    executable: String,
    mpi_ncpus: u32,
    runmode: RunMode,
}

impl TaskLauncher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workdir: &Path,
        job_name: &str,
        files_file: &Path,
        log_file: &Path,
        stderr_file: &Path,
        jobfile: &Path,
        runmode: RunMode,
    ) -> Self {
        // MPI 进程数取 CPU 上限；未限制时单进程
        let mpi_ncpus = runmode.max_ncpus.max(1);

        TaskLauncher {
            workdir: workdir.to_path_buf(),
            job_name: job_name.to_string(),
            files_file: files_file.to_path_buf(),
            log_file: log_file.to_path_buf(),
            stderr_file: stderr_file.to_path_buf(),
            jobfile: jobfile.to_path_buf(),
            executable: DEFAULT_EXECUTABLE.to_string(),
            mpi_ncpus,
            runmode,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_mpi_ncpus(mut self, mpi_ncpus: u32) -> Self {
        self.mpi_ncpus = mpi_ncpus.max(1);
        self
    }

    /// 实际执行的命令串
    fn exec_cmd(&self) -> String {
        let redirect = format!(
            "< \"{}\" > \"{}\" 2> \"{}\"",
            self.files_file.display(),
            self.log_file.display(),
            self.stderr_file.display()
        );

        if self.mpi_ncpus > 1 {
            format!(
                "mpirun -np {} {} {}",
                self.mpi_ncpus, self.executable, redirect
            )
        } else {
            format!("{} {}", self.executable, redirect)
        }
    }

    /// shell 模式下 job.sh 的内容
    fn jobfile_content(&self) -> String {
        let mut lines = vec![
            "#!/bin/bash".to_string(),
            format!("cd \"{}\"", self.workdir.display()),
        ];

        if self.runmode.omp_numthreads > 0 {
            lines.push(format!(
                "export OMP_NUM_THREADS={}",
                self.runmode.omp_numthreads
            ));
        }

        lines.push(self.exec_cmd());
        lines.push(String::new());
        lines.join("\n")
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        let q = &self.runmode.queue_params;
        SchedulerConfig {
            job_name: self.job_name.clone(),
            partition: q.partition.clone(),
            nodes: q.nodes,
            ntasks: self.mpi_ncpus,
            cpus_per_task: self.runmode.omp_numthreads.max(1),
            mem_per_cpu: q.mem_per_cpu.clone(),
            time_limit: q.time_limit.clone(),
            modules: q.modules.clone(),
            omp_numthreads: self.runmode.omp_numthreads,
        }
    }

    /// 启动任务，返回子进程句柄
    ///
    /// shell 模式下句柄对应计算进程本身；队列模式下对应一次
    /// sbatch/qsub 提交进程，计算由资源管理器接管。
    pub fn launch(&self) -> Result<Child> {
        match self.runmode.launcher {
            LauncherKind::Shell => self.launch_shell(),
            LauncherKind::Slurm => self.submit(SBATCH_SCRIPT, "sbatch", |c, w, e| {
                generate_sbatch_script(c, w, e)
            }),
            LauncherKind::Pbs => {
                self.submit(QSUB_SCRIPT, "qsub", |c, w, e| generate_qsub_script(c, w, e))
            }
        }
    }

    fn launch_shell(&self) -> Result<Child> {
        self.write_script(&self.jobfile, &self.jobfile_content())?;

        Command::new("sh")
            .arg(&self.jobfile)
            .current_dir(&self.workdir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AbitoolError::CommandFailed {
                command: format!("sh {}", self.jobfile.display()),
                stderr: e.to_string(),
            })
    }

    fn submit(
        &self,
        script_name: &str,
        submitter: &str,
        generate: impl Fn(&SchedulerConfig, &Path, &str) -> String,
    ) -> Result<Child> {
        let script_path = self.workdir.join(script_name);
        let content = generate(&self.scheduler_config(), &self.workdir, &self.exec_cmd());
        self.write_script(&script_path, &content)?;

        // 调度器脚本把自身日志写到这里
        fs::create_dir_all(self.workdir.join("sched_logs")).ok();

        Command::new(submitter)
            .arg(&script_path)
            .current_dir(&self.workdir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| AbitoolError::CommandNotFound {
                command: submitter.to_string(),
            })
    }

    fn write_script(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content).map_err(|e| AbitoolError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher_in(dir: &Path, runmode: RunMode) -> TaskLauncher {
        TaskLauncher::new(
            dir,
            "testjob",
            &dir.join("run.files"),
            &dir.join("log"),
            &dir.join("stderr"),
            &dir.join("job.sh"),
            runmode,
        )
    }

    #[test]
    fn test_exec_cmd_serial() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher_in(dir.path(), RunMode::default());

        let cmd = launcher.exec_cmd();
        assert!(cmd.starts_with("abinit "));
        assert!(cmd.contains("run.files"));
        assert!(!cmd.contains("mpirun"));
    }

    #[test]
    fn test_exec_cmd_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher_in(dir.path(), RunMode::default()).with_mpi_ncpus(16);

        assert!(launcher.exec_cmd().starts_with("mpirun -np 16 abinit"));
    }

    #[test]
    fn test_jobfile_exports_omp() {
        let dir = tempfile::tempdir().unwrap();
        let runmode = RunMode {
            omp_numthreads: 4,
            ..RunMode::default()
        };
        let launcher = launcher_in(dir.path(), runmode);

        let content = launcher.jobfile_content();
        assert!(content.contains("export OMP_NUM_THREADS=4"));
        assert!(content.starts_with("#!/bin/bash"));
    }

    #[test]
    fn test_shell_launch_runs_and_redirects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.files"), "unused\n").unwrap();

        let launcher = launcher_in(dir.path(), RunMode::default()).with_executable("cat");
        let mut child = launcher.launch().unwrap();
        let status = child.wait().unwrap();

        assert!(status.success());
        assert!(dir.path().join("job.sh").exists());
        // "cat < run.files > log" 把 files 内容复制到 log
        let log = std::fs::read_to_string(dir.path().join("log")).unwrap();
        assert_eq!(log, "unused\n");
    }
}
