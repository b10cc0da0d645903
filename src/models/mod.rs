//! # 数据模型模块
//!
//! 晶体结构、能带结构与溯源记录的统一表示。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `abinit/`, `commands/` 使用
//! - 子模块: structure, bands, snl

pub mod bands;
pub mod snl;
pub mod structure;

pub use bands::{Band, BandGap, BandStructure, BandStructureSymmLine, Kpoint};
pub use snl::{Author, HistoryNode, StructureNl};
pub use structure::{atomic_number, Atom, Crystal, Lattice};
