//! # 任务间数据依赖
//!
//! 描述任务之间的有向依赖边：下游任务声明它需要上游任务的
//! 哪些输出数据种类（密度、波函数、屏蔽矩阵、准粒子修正），
//! 构建时解析为具体的输出文件路径并注入下游输入的控制变量。
//!
//! ## 依赖关系
//! - 被 `task/task.rs`, `workflow/` 使用

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 上游任务可被依赖的输出数据种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OdataKind {
    /// 电荷密度
    Den,
    /// 波函数
    Wfk,
    /// 屏蔽矩阵
    Scr,
    /// 准粒子能量
    Qps,
}

impl OdataKind {
    /// 输出文件扩展名（out_DEN 等）
    pub fn ext(&self) -> &'static str {
        match self {
            OdataKind::Den => "DEN",
            OdataKind::Wfk => "WFK",
            OdataKind::Scr => "SCR",
            OdataKind::Qps => "QPS",
        }
    }

    /// 注入下游输入的控制变量名
    pub fn control_var(&self) -> &'static str {
        match self {
            OdataKind::Den => "getden_path",
            OdataKind::Wfk => "getwfk_path",
            OdataKind::Scr => "getscr_path",
            OdataKind::Qps => "getqps_path",
        }
    }
}

impl std::fmt::Display for OdataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ext())
    }
}

/// 任务依赖边：上游任务（由编号与工作目录标识）+ 所需数据种类
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLink {
    /// 上游任务编号（工作流内）
    pub task_id: usize,

    /// 上游任务的工作目录
    pub workdir: PathBuf,

    /// 下游所需的输出数据种类
    pub odata_required: Vec<OdataKind>,
}

impl TaskLink {
    pub fn new(task_id: usize, workdir: impl Into<PathBuf>) -> Self {
        TaskLink {
            task_id,
            workdir: workdir.into(),
            odata_required: Vec::new(),
        }
    }

    /// 以相同的上游返回一条声明了所需数据的新边
    pub fn with_odata(&self, kinds: &[OdataKind]) -> TaskLink {
        TaskLink {
            task_id: self.task_id,
            workdir: self.workdir.clone(),
            odata_required: kinds.to_vec(),
        }
    }

    /// 上游输出数据文件的具体路径（构建期解析）
    pub fn odata_path(&self, kind: OdataKind) -> PathBuf {
        odata_path_from_ext(&self.workdir, kind.ext())
    }

    /// 展开为 (控制变量名, 路径) 对，供下游输入使用
    pub fn varpaths(&self) -> Vec<(String, String)> {
        self.odata_required
            .iter()
            .map(|kind| {
                (
                    kind.control_var().to_string(),
                    self.odata_path(*kind).display().to_string(),
                )
            })
            .collect()
    }
}

/// 工作目录 + 扩展名 → 输出数据路径 (workdir/output/out_EXT)
pub fn odata_path_from_ext(workdir: &Path, ext: &str) -> PathBuf {
    let ext = ext.trim_start_matches('_');
    workdir.join("output").join(format!("out_{}", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odata_path_layout() {
        let link = TaskLink::new(0, "/work/scf");
        assert_eq!(
            link.odata_path(OdataKind::Den),
            PathBuf::from("/work/scf/output/out_DEN")
        );
    }

    #[test]
    fn test_odata_path_from_ext_strips_underscore() {
        let path = odata_path_from_ext(Path::new("/w"), "_WFK");
        assert_eq!(path, PathBuf::from("/w/output/out_WFK"));
    }

    #[test]
    fn test_with_odata_keeps_upstream() {
        let link = TaskLink::new(3, "/work/nscf");
        let dep = link.with_odata(&[OdataKind::Wfk, OdataKind::Scr]);

        assert_eq!(dep.task_id, 3);
        assert_eq!(dep.workdir, PathBuf::from("/work/nscf"));
        assert_eq!(dep.odata_required, vec![OdataKind::Wfk, OdataKind::Scr]);
        assert!(link.odata_required.is_empty());
    }

    #[test]
    fn test_varpaths_expansion() {
        let link = TaskLink::new(0, "/work/scf").with_odata(&[OdataKind::Den]);
        let vars = link.varpaths();

        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].0, "getden_path");
        assert_eq!(vars[0].1, "/work/scf/output/out_DEN");
    }

    #[test]
    fn test_control_var_names() {
        assert_eq!(OdataKind::Den.control_var(), "getden_path");
        assert_eq!(OdataKind::Wfk.control_var(), "getwfk_path");
        assert_eq!(OdataKind::Scr.control_var(), "getscr_path");
        assert_eq!(OdataKind::Qps.control_var(), "getqps_path");
    }
}
