//! # ABINIT 主输出解析器
//!
//! 解析 run.output：完成标志、总能量、费米能、本征值块。
//!
//! ## 本征值块格式说明
//! ```text
//!  Eigenvalues (hartree) for nkpt=   2  k points:
//!  kpt#   1, nband=  8, wtk=  0.50000, kpt=  0.0000  0.0000  0.0000 (reduced coord)
//!   -0.23706   0.16297   0.25336   0.25336   0.34348   0.34348
//!    0.38643   0.49223
//!  kpt#   2, ...
//! ```
//!
//! ## 依赖关系
//! - 被 `task/`, `commands/bands.rs`, `commands/results.rs` 使用

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::abinit::HA_TO_EV;
use crate::error::{AbitoolError, Result};

/// 输出文件末尾的完成标志
const COMPLETION_MARKER: &str = "Calculation completed";

/// 只在最后这么多行里查找完成标志
const COMPLETION_TAIL_LINES: usize = 50;

/// 主输出提取结果
#[derive(Debug, Clone, Default)]
pub struct AbinitOutput {
    /// 是否出现完成标志
    pub completed: bool,

    /// 总能量 (eV)
    pub etotal_ev: Option<f64>,

    /// 费米能 (eV)
    pub fermi_ev: Option<f64>,

    /// 程序版本串
    pub version: Option<String>,
}

/// 单个 k 点的本征值块
#[derive(Debug, Clone)]
pub struct EigBlock {
    /// 约化坐标
    pub kpt: [f64; 3],

    /// k 点权重
    pub wtk: Option<f64>,

    /// 本征值 (eV)
    pub eigenvalues: Vec<f64>,
}

/// 检查主输出是否带有完成标志
///
/// 文件不存在视为未完成而不是错误（任务可能尚未启动）。
pub fn output_is_complete(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .collect();

    lines
        .iter()
        .rev()
        .take(COMPLETION_TAIL_LINES)
        .any(|line| line.contains(COMPLETION_MARKER))
}

/// 解析主输出的汇总信息
pub fn parse_output(path: &Path) -> Result<AbinitOutput> {
    let file = File::open(path).map_err(|e| AbitoolError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .collect();

    let mut result = AbinitOutput::default();

    for line in &lines {
        // ".Version 9.6.2 of ABINIT"
        if line.contains("Version") && line.contains("ABINIT") && result.version.is_none() {
            result.version = line
                .split_whitespace()
                .find(|w| w.chars().next().map_or(false, |c| c.is_ascii_digit()))
                .map(|w| w.to_string());
        }

        // ">>>>>>>>> Etotal= -8.86622389E+00" (hartree)
        if line.contains("Etotal=") {
            if let Some(val) = extract_number_after(line, "Etotal=") {
                result.etotal_ev = Some(val * HA_TO_EV);
            }
        }

        // " Fermi (or HOMO) energy (hartree) =   0.18936   Average Vxc (hartree)=..."
        if line.contains("Fermi (or HOMO) energy (hartree)") {
            if let Some(val) = extract_number_after(line, "=") {
                result.fermi_ev = Some(val * HA_TO_EV);
            }
        }
    }

    result.completed = lines
        .iter()
        .rev()
        .take(COMPLETION_TAIL_LINES)
        .any(|line| line.contains(COMPLETION_MARKER));

    Ok(result)
}

/// 解析主输出中的所有本征值块，能量统一换算为 eV
pub fn parse_eigenvalue_blocks(path: &Path) -> Result<Vec<EigBlock>> {
    let file = File::open(path).map_err(|e| AbitoolError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .map_while(|l| l.ok())
        .collect();

    let mut blocks: Vec<EigBlock> = Vec::new();
    let mut in_eig_section = false;
    // 本征值单位由节头决定，默认 hartree
    let mut scale = HA_TO_EV;
    let mut current: Option<EigBlock> = None;

    for line in &lines {
        let trimmed = line.trim();

        if trimmed.starts_with("Eigenvalues") {
            in_eig_section = true;
            scale = if trimmed.contains("hartree") {
                HA_TO_EV
            } else {
                // "Eigenvalues (   eV  ) for nkpt= ..."
                1.0
            };
            continue;
        }

        if !in_eig_section {
            continue;
        }

        if trimmed.starts_with("kpt#") {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = parse_kpt_header(trimmed);
            continue;
        }

        // 数值续行归入当前块；其他任何行结束本节
        if current.is_some() {
            let values: Vec<f64> = trimmed
                .split_whitespace()
                .map(|w| w.parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .unwrap_or_default();

            if values.is_empty() && !trimmed.is_empty() {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
                in_eig_section = false;
            } else if let Some(ref mut block) = current {
                block.eigenvalues.extend(values.iter().map(|v| v * scale));
            }
        }
    }

    if let Some(block) = current.take() {
        blocks.push(block);
    }

    if blocks.is_empty() {
        return Err(AbitoolError::ParseError {
            format: "abinit output".to_string(),
            path: path.display().to_string(),
            reason: "No eigenvalue blocks found".to_string(),
        });
    }

    Ok(blocks)
}

/// 解析 "kpt#   1, nband=  8, wtk=  0.50000, kpt=  0.0 0.0 0.0 (reduced coord)"
fn parse_kpt_header(line: &str) -> Option<EigBlock> {
    let wtk = extract_number_after(line, "wtk=");

    // 取 "kpt=" 之后、"(reduced" 之前的三个数
    let kpt_part = line.rsplit("kpt=").next()?;
    let coords: Vec<f64> = kpt_part
        .split_whitespace()
        .take_while(|w| !w.starts_with('('))
        .filter_map(|w| w.trim_end_matches(',').parse().ok())
        .collect();

    if coords.len() < 3 {
        return None;
    }

    Some(EigBlock {
        kpt: [coords[0], coords[1], coords[2]],
        wtk,
        eigenvalues: Vec::new(),
    })
}

/// 从字符串中提取指定标记之后的第一个数字
fn extract_number_after(s: &str, marker: &str) -> Option<f64> {
    let pos = s.find(marker)?;
    let after = &s[pos + marker.len()..];
    after
        .trim()
        .split_whitespace()
        .next()?
        .trim_end_matches(',')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const SAMPLE_OUTPUT: &str = r#".Version 9.6.2 of ABINIT

 Fermi (or HOMO) energy (hartree) =   0.18936   Average Vxc (hartree)=  -0.33300

 Eigenvalues (hartree) for nkpt=   2  k points:
 kpt#   1, nband=  4, wtk=  0.50000, kpt=  0.0000  0.0000  0.0000 (reduced coord)
  -0.23706   0.16297   0.25336   0.25336
 kpt#   2, nband=  4, wtk=  0.50000, kpt=  0.5000  0.0000  0.0000 (reduced coord)
  -0.15003   0.05206   0.19392
   0.21435

 Components of total free energy (in Hartree) :
>>>>>>>>> Etotal= -8.86622389E+00

== END DATASET(S) ==

 Calculation completed.
"#;

    #[test]
    fn test_output_is_complete() {
        let file = write_temp(SAMPLE_OUTPUT);
        assert!(output_is_complete(file.path()));

        let unfinished = write_temp("some partial output\n");
        assert!(!output_is_complete(unfinished.path()));
    }

    #[test]
    fn test_output_is_complete_missing_file() {
        assert!(!output_is_complete(Path::new("/nonexistent/run.output")));
    }

    #[test]
    fn test_parse_output_summary() {
        let file = write_temp(SAMPLE_OUTPUT);
        let out = parse_output(file.path()).unwrap();

        assert!(out.completed);
        assert_eq!(out.version.as_deref(), Some("9.6.2"));

        let etotal = out.etotal_ev.unwrap();
        assert!((etotal - (-8.86622389 * HA_TO_EV)).abs() < 1e-6);

        let fermi = out.fermi_ev.unwrap();
        assert!((fermi - (0.18936 * HA_TO_EV)).abs() < 1e-6);
    }

    #[test]
    fn test_parse_eigenvalue_blocks() {
        let file = write_temp(SAMPLE_OUTPUT);
        let blocks = parse_eigenvalue_blocks(file.path()).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kpt, [0.0, 0.0, 0.0]);
        assert_eq!(blocks[0].eigenvalues.len(), 4);
        assert!((blocks[0].eigenvalues[0] - (-0.23706 * HA_TO_EV)).abs() < 1e-6);
        assert!((blocks[0].wtk.unwrap() - 0.5).abs() < 1e-9);

        // 续行应并入第二个块
        assert_eq!(blocks[1].eigenvalues.len(), 4);
        assert_eq!(blocks[1].kpt, [0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_parse_eigenvalues_in_ev() {
        let content = r#"
 Eigenvalues (   eV  ) for nkpt=   1  k points:
 kpt#   1, nband=  2, wtk=  1.00000, kpt=  0.0000  0.0000  0.0000 (reduced coord)
  -6.45100   4.43400
"#;
        let file = write_temp(content);
        let blocks = parse_eigenvalue_blocks(file.path()).unwrap();

        assert_eq!(blocks.len(), 1);
        assert!((blocks[0].eigenvalues[0] - (-6.451)).abs() < 1e-9);
    }

    #[test]
    fn test_parse_eigenvalues_missing_section() {
        let file = write_temp("no eigenvalues here\n");
        assert!(parse_eigenvalue_blocks(file.path()).is_err());
    }
}
