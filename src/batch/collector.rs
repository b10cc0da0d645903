//! # 任务目录收集器
//!
//! 在给定根目录下寻找任务工作目录：以 run.files 的存在作为
//! 任务目录的判据，支持名称模式过滤与递归搜索。
//!
//! ## 依赖关系
//! - 被 `commands/status.rs`, `commands/results.rs` 调用
//! - 使用 `walkdir` 遍历目录
//! - 使用 `glob` 做名称匹配

use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;

use crate::error::{AbitoolError, Result};
use crate::task::task::basename;

/// 任务目录收集器
pub struct TaskDirCollector {
    /// 搜索根目录
    root: PathBuf,
    /// 目录名匹配模式
    patterns: Vec<Pattern>,
    /// 是否递归进入子目录
    recursive: bool,
}

impl TaskDirCollector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: vec![],
            recursive: true,
        }
    }

    /// 设置名称匹配模式（逗号分隔的多模式）；空串表示全部
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && *s != "*")
            .map(|s| {
                Pattern::new(s).map_err(|e| {
                    AbitoolError::InvalidArgument(format!("Bad pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的任务目录（含 run.files 的目录），按路径排序
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(AbitoolError::DirectoryNotFound {
                path: self.root.display().to_string(),
            });
        }

        // 根目录本身也可能就是一个任务目录
        let max_depth = if self.recursive { usize::MAX } else { 2 };

        let mut dirs: Vec<PathBuf> = WalkDir::new(&self.root)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.path().to_path_buf())
            .filter(|p| is_task_dir(p))
            .filter(|p| self.matches(p))
            .collect();

        dirs.sort();
        Ok(dirs)
    }

    fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };

        self.patterns.iter().any(|p| p.matches(name))
    }
}

/// 目录持有 run.files 即视为任务目录
pub fn is_task_dir(path: &Path) -> bool {
    path.join(basename::FILES).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_task_dir(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(basename::FILES), "files\n").unwrap();
        dir
    }

    #[test]
    fn test_collect_finds_task_dirs() {
        let root = tempfile::tempdir().unwrap();
        make_task_dir(root.path(), "scf");
        make_task_dir(root.path(), "nscf");
        fs::create_dir_all(root.path().join("not_a_task")).unwrap();

        let dirs = TaskDirCollector::new(root.path()).collect().unwrap();

        assert_eq!(dirs.len(), 2);
        assert!(dirs[0].ends_with("nscf"));
        assert!(dirs[1].ends_with("scf"));
    }

    #[test]
    fn test_collect_recursive() {
        let root = tempfile::tempdir().unwrap();
        let job = root.path().join("jobs/si");
        fs::create_dir_all(&job).unwrap();
        make_task_dir(&job, "scf");

        let found = TaskDirCollector::new(root.path()).collect().unwrap();
        assert_eq!(found.len(), 1);

        let shallow = TaskDirCollector::new(root.path())
            .recursive(false)
            .collect()
            .unwrap();
        assert!(shallow.is_empty());
    }

    #[test]
    fn test_pattern_filter() {
        let root = tempfile::tempdir().unwrap();
        make_task_dir(root.path(), "scf");
        make_task_dir(root.path(), "screening");
        make_task_dir(root.path(), "nscf");

        let dirs = TaskDirCollector::new(root.path())
            .with_pattern("sc*")
            .unwrap()
            .collect()
            .unwrap();

        assert_eq!(dirs.len(), 2);
        assert!(dirs.iter().all(|d| d
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("sc")));
    }

    #[test]
    fn test_missing_root_is_error() {
        let result = TaskDirCollector::new("/definitely/not/here").collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_pattern_is_error() {
        let root = tempfile::tempdir().unwrap();
        let result = TaskDirCollector::new(root.path()).with_pattern("[");
        assert!(result.is_err());
    }
}
