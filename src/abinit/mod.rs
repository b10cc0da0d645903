//! # ABINIT 文件接口模块
//!
//! 生成 ABINIT 输入文件（变量列表 + files 文件），解析主输出
//! （完成标志、能量、本征值块）。
//!
//! ## 依赖关系
//! - 被 `task/`, `workflow/`, `commands/` 使用
//! - 使用 `models/structure.rs`
//! - 子模块: input, output

pub mod input;
pub mod output;

pub use input::AbinitInput;
pub use output::{output_is_complete, parse_eigenvalue_blocks, parse_output, AbinitOutput};

/// Hartree → eV 换算因子
pub const HA_TO_EV: f64 = 27.211386245988;

/// Å → Bohr 换算因子
pub const ANGSTROM_TO_BOHR: f64 = 1.889726124565062;
