//! # bands 子命令 CLI 定义
//!
//! 从 ABINIT 主输出分析能带结构。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/bands.rs`

use clap::Args;
use std::path::PathBuf;

/// bands 子命令参数
#[derive(Args, Debug)]
pub struct BandsArgs {
    /// ABINIT main output file (run.output)
    pub output: PathBuf,

    /// Reciprocal lattice vectors in Å⁻¹ as 'a1,a2,a3;b1,b2,b3;c1,c2,c3'
    /// (defaults to a unit cube)
    #[arg(long)]
    pub rec_lattice: Option<String>,

    /// Fermi energy in eV (parsed from the output when omitted)
    #[arg(long)]
    pub efermi: Option<f64>,

    /// High-symmetry label, repeatable (e.g., --label 'G=0,0,0')
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Filename for the band structure plot (PNG)
    #[arg(long, default_value = "bands.png")]
    pub output_plot: PathBuf,

    /// Skip plot generation
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Optional path for a JSON dump of the band structure
    #[arg(long)]
    pub output_json: Option<PathBuf>,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,
}
