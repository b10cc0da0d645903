//! # 解析器模块
//!
//! 结构输入文件解析器。ABINIT 自身输出的解析在 `abinit/` 模块。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar

pub mod poscar;

use crate::error::{AbitoolError, Result};
use crate::models::Crystal;
use std::path::Path;

/// 从文件路径推断格式并解析结构
pub fn parse_structure_file(path: &Path) -> Result<Crystal> {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with("POSCAR") || name.starts_with("CONTCAR") || name.ends_with(".vasp") {
            return poscar::parse_poscar_file(path);
        }
    }

    Err(AbitoolError::InvalidFormat(format!(
        "Cannot determine structure format for: {}",
        path.display()
    )))
}
