//! # ABINIT 任务
//!
//! 一次外部程序调用的完整生命周期：从输入规格创建，build 写出
//! 目录与输入文件，start 经启动器转入 running，此后由退出码与
//! 日志检查决定 done/error。进程接口仿照 `subprocess` 的
//! poll/wait/kill 语义。
//!
//! ## 目录布局
//! ```text
//! workdir/
//!   run.input   run.output   run.files
//!   log   stderr   job.sh
//!   output/out_*      # 输出数据（DEN/WFK/...）
//!   temporary/tmp_*   # 临时数据
//! ```
//!
//! ## 依赖关系
//! - 被 `workflow/`, `commands/run.rs` 使用
//! - 使用 `abinit/input.rs`, `task/{status,events,links,launcher,runmode}.rs`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Child;

use serde::{Deserialize, Serialize};

use crate::abinit::input::{files_file_string, AbinitInput};
use crate::error::{AbitoolError, Result};
use crate::task::events::{EventParser, EventReport};
use crate::task::launcher::TaskLauncher;
use crate::task::links::{odata_path_from_ext, TaskLink};
use crate::task::runmode::RunMode;
use crate::task::status::{derive_status, TaskStatus};

/// 任务目录内的固定文件名
pub mod basename {
    pub const INPUT: &str = "run.input";
    pub const OUTPUT: &str = "run.output";
    pub const FILES: &str = "run.files";
    pub const LOG: &str = "log";
    pub const STDERR: &str = "stderr";
    pub const JOBFILE: &str = "job.sh";
}

/// 数据文件前缀（相对 workdir）
pub mod prefix {
    pub const IDATA: &str = "in";
    pub const ODATA: &str = "output/out";
    pub const TDATA: &str = "temporary/tmp";
}

/// 任务结果包：任务完成后提取的汇总信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResults {
    pub task_name: String,
    pub task_returncode: i32,
    pub task_status: TaskStatus,
    pub task_events: EventReport,
}

impl TaskResults {
    /// 写为 JSON 文件
    pub fn json_dump(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|e| AbitoolError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// 从 JSON 文件读取
    pub fn json_load(path: &Path) -> Result<TaskResults> {
        let text = fs::read_to_string(path).map_err(|e| AbitoolError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// 一次 ABINIT 调用
pub struct AbinitTask {
    workdir: PathBuf,
    input: AbinitInput,
    runmode: RunMode,
    executable: String,
    status: TaskStatus,
    process: Option<Child>,
    returncode: Option<i32>,
}

impl AbinitTask {
    /// 从输入规格创建任务；初始状态 waiting
    pub fn new(input: AbinitInput, workdir: impl Into<PathBuf>, runmode: RunMode) -> Self {
        AbinitTask {
            workdir: workdir.into(),
            input,
            runmode,
            executable: crate::task::launcher::DEFAULT_EXECUTABLE.to_string(),
            status: TaskStatus::Waiting,
            process: None,
            returncode: None,
        }
    }

    /// 声明对上游任务输出数据的依赖：把解析出的路径注入输入变量
    pub fn with_links(mut self, links: &[TaskLink]) -> Self {
        for link in links {
            self.input.add_control_vars(&link.varpaths());
        }
        self
    }

    /// 覆盖可执行文件名（默认 abinit）
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// 任务名即工作目录
    pub fn name(&self) -> String {
        self.workdir.display().to_string()
    }

    /// 工作目录最后一段，表格显示用
    pub fn short_name(&self) -> String {
        self.workdir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name())
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn input(&self) -> &AbinitInput {
        &self.input
    }

    // ─────────────────────────────────────────────────────────────
    // 路径访问
    // ─────────────────────────────────────────────────────────────

    pub fn input_file(&self) -> PathBuf {
        self.workdir.join(basename::INPUT)
    }

    pub fn output_file(&self) -> PathBuf {
        self.workdir.join(basename::OUTPUT)
    }

    pub fn files_file(&self) -> PathBuf {
        self.workdir.join(basename::FILES)
    }

    pub fn log_file(&self) -> PathBuf {
        self.workdir.join(basename::LOG)
    }

    pub fn stderr_file(&self) -> PathBuf {
        self.workdir.join(basename::STDERR)
    }

    pub fn jobfile(&self) -> PathBuf {
        self.workdir.join(basename::JOBFILE)
    }

    /// 输出数据目录 (workdir/output)
    pub fn outdata_dir(&self) -> PathBuf {
        self.workdir.join(
            Path::new(prefix::ODATA)
                .parent()
                .expect("prefix has a directory component"),
        )
    }

    /// 临时数据目录 (workdir/temporary)
    pub fn tmpdata_dir(&self) -> PathBuf {
        self.workdir.join(
            Path::new(prefix::TDATA)
                .parent()
                .expect("prefix has a directory component"),
        )
    }

    /// 指定扩展名的输出数据路径 (output/out_EXT)
    pub fn odata_path_from_ext(&self, ext: &str) -> PathBuf {
        odata_path_from_ext(&self.workdir, ext)
    }

    /// files 文件内容：路径与前缀列表 + 赝势
    pub fn filesfile_string(&self) -> String {
        files_file_string(
            &self.input_file(),
            &self.output_file(),
            &self.workdir.join(prefix::IDATA),
            &self.workdir.join(prefix::ODATA),
            &self.workdir.join(prefix::TDATA),
            self.input.pseudos(),
        )
    }

    // ─────────────────────────────────────────────────────────────
    // 生命周期
    // ─────────────────────────────────────────────────────────────

    /// 写出目录与输入文件；已存在的文件不覆盖
    pub fn build(&self) -> Result<()> {
        for dir in [&self.workdir, &self.outdata_dir(), &self.tmpdata_dir()] {
            fs::create_dir_all(dir).map_err(|e| AbitoolError::FileWriteError {
                path: dir.display().to_string(),
                source: e,
            })?;
        }

        if !self.input_file().exists() {
            self.write_file(&self.input_file(), &self.input.render())?;
        }

        if !self.files_file().exists() {
            self.write_file(&self.files_file(), &self.filesfile_string())?;
        }

        Ok(())
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content).map_err(|e| AbitoolError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// 启动任务：build + 经启动器执行，状态转入 running
    pub fn start(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Err(self.task_error("already started"));
        }

        self.build()?;

        let launcher = TaskLauncher::new(
            &self.workdir,
            &self.short_name(),
            &self.files_file(),
            &self.log_file(),
            &self.stderr_file(),
            &self.jobfile(),
            self.runmode.clone(),
        )
        .with_executable(self.executable.clone());

        self.process = Some(launcher.launch()?);
        self.status = TaskStatus::Running;
        Ok(())
    }

    /// 非阻塞检查子进程是否结束；结束时设置退出码与状态
    pub fn poll(&mut self) -> Result<Option<i32>> {
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| AbitoolError::TaskError {
                name: self.workdir.display().to_string(),
                reason: "not started".to_string(),
            })?;

        match process.try_wait() {
            Ok(Some(exit)) => {
                let code = exit.code().unwrap_or(-1);
                self.finish(code);
                Ok(Some(code))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AbitoolError::TaskError {
                name: self.workdir.display().to_string(),
                reason: format!("poll failed: {}", e),
            }),
        }
    }

    /// 阻塞等待子进程结束，返回退出码
    pub fn wait(&mut self) -> Result<i32> {
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| AbitoolError::TaskError {
                name: self.workdir.display().to_string(),
                reason: "not started".to_string(),
            })?;

        let exit = process.wait().map_err(|e| AbitoolError::TaskError {
            name: self.workdir.display().to_string(),
            reason: format!("wait failed: {}", e),
        })?;

        let code = exit.code().unwrap_or(-1);
        self.finish(code);
        Ok(code)
    }

    /// 终止子进程
    pub fn kill(&mut self) -> Result<()> {
        let name = self.workdir.display().to_string();
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| AbitoolError::TaskError {
                name: name.clone(),
                reason: "not started".to_string(),
            })?;
        process.kill().map_err(|e| AbitoolError::TaskError {
            name,
            reason: format!("kill failed: {}", e),
        })
    }

    fn finish(&mut self, code: i32) {
        self.returncode = Some(code);
        self.status = if code == 0 {
            TaskStatus::Done
        } else {
            TaskStatus::Error
        };
    }

    /// 退出码；None 表示进程尚未结束（或从未启动）
    pub fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    /// 最近一次赋值的状态（waiting/running/done/error）
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// 按需从文件推导状态；文件缺失时回落 waiting
    pub fn get_status(&self) -> Result<TaskStatus> {
        derive_status(&self.output_file(), &self.log_file(), &self.stderr_file())
    }

    /// 提取结果包
    ///
    /// 进程必须已经 poll/wait 过且状态为 done，否则报错。
    pub fn get_results(&self) -> Result<TaskResults> {
        let returncode = self
            .returncode
            .ok_or_else(|| self.task_error("return code is None, call wait or poll first"))?;

        if self.status != TaskStatus::Done {
            return Err(self.task_error("task is not completed"));
        }

        let task_events = EventParser::new().parse(&self.output_file())?;

        Ok(TaskResults {
            task_name: self.name(),
            task_returncode: returncode,
            task_status: self.status,
            task_events,
        })
    }

    /// 已产生的所有输出数据文件
    pub fn outfiles(&self) -> Vec<PathBuf> {
        list_with_prefix(&self.outdata_dir(), "out")
    }

    /// 已产生的所有临时数据文件
    pub fn tmpfiles(&self) -> Vec<PathBuf> {
        list_with_prefix(&self.tmpdata_dir(), "tmp")
    }

    /// 删除整个工作目录
    pub fn rmtree(&self) -> Result<()> {
        fs::remove_dir_all(&self.workdir).map_err(|e| AbitoolError::FileWriteError {
            path: self.workdir.display().to_string(),
            source: e,
        })
    }

    fn task_error(&self, reason: &str) -> AbitoolError {
        AbitoolError::TaskError {
            name: self.workdir.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

fn list_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(prefix))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}
