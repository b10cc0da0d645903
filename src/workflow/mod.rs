//! # 工作流
//!
//! 同一根目录下的一组任务及其依赖边。启动时遵循运行模式：
//! 有队列管理器时整批提交，否则按 chunk_size 分块顺序执行，
//! 每块等待结束后再启动下一块。整体状态取成员中最严重者。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `task/`
//! - 子模块: calculations

pub mod calculations;

use std::path::{Path, PathBuf};

use crate::abinit::AbinitInput;
use crate::error::Result;
use crate::task::{AbinitTask, RunMode, TaskLink, TaskResults, TaskStatus};

/// 一组任务与它们的依赖
pub struct Workflow {
    workdir: PathBuf,
    runmode: RunMode,
    tasks: Vec<AbinitTask>,
    executable: Option<String>,
}

impl Workflow {
    pub fn new(workdir: impl Into<PathBuf>, runmode: RunMode) -> Self {
        Workflow {
            workdir: workdir.into(),
            runmode,
            tasks: Vec::new(),
            executable: None,
        }
    }

    /// 覆盖所有后续注册任务的可执行文件名
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: usize) -> Option<&AbinitTask> {
        self.tasks.get(id)
    }

    /// 注册一个任务：工作目录为 workdir/subdir，依赖边在此解析
    /// 为控制变量。返回可供下游声明依赖的边。
    pub fn register(
        &mut self,
        input: AbinitInput,
        subdir: &str,
        links: &[TaskLink],
    ) -> TaskLink {
        let task_workdir = self.workdir.join(subdir);
        let mut task =
            AbinitTask::new(input, &task_workdir, self.runmode.clone()).with_links(links);

        if let Some(ref exe) = self.executable {
            task = task.with_executable(exe.clone());
        }

        let id = self.tasks.len();
        self.tasks.push(task);
        TaskLink::new(id, task_workdir)
    }

    /// 写出所有任务的目录与输入文件
    pub fn build(&self) -> Result<()> {
        for task in &self.tasks {
            task.build()?;
        }
        Ok(())
    }

    /// 启动工作流
    ///
    /// 队列模式：全部提交后返回。shell 模式：按 chunk_size 分块，
    /// 块内任务依次启动，整块等待结束后再进入下一块；某个任务
    /// 出错不中断后续任务，整体状态留给 `status()` 汇总。
    pub fn start(&mut self) -> Result<()> {
        match self.runmode.chunk_size() {
            None => {
                for task in &mut self.tasks {
                    task.start()?;
                }
                Ok(())
            }
            Some(chunk_size) => {
                let ids: Vec<usize> = (0..self.tasks.len()).collect();
                for chunk in ids.chunks(chunk_size) {
                    for &id in chunk {
                        self.tasks[id].start()?;
                    }
                    for &id in chunk {
                        self.tasks[id].wait()?;
                    }
                }
                Ok(())
            }
        }
    }

    /// 最近一次赋值状态的最严重者
    pub fn status(&self) -> TaskStatus {
        TaskStatus::most_critical(self.tasks.iter().map(|t| t.status()))
    }

    /// 按需从各任务目录推导状态并取最严重者
    pub fn inspect(&self) -> Result<TaskStatus> {
        let mut statuses = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            statuses.push(task.get_status()?);
        }
        Ok(TaskStatus::most_critical(statuses))
    }

    /// 各任务的 (目录名, 已存状态)
    pub fn task_statuses(&self) -> Vec<(String, TaskStatus)> {
        self.tasks
            .iter()
            .map(|t| (t.short_name(), t.status()))
            .collect()
    }

    /// 收集所有已完成任务的结果包
    pub fn get_results(&self) -> Result<Vec<TaskResults>> {
        let mut results = Vec::new();
        for task in &self.tasks {
            if task.returncode().is_some() && task.status() == TaskStatus::Done {
                results.push(task.get_results()?);
            }
        }
        Ok(results)
    }
}
