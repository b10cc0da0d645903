//! # ABINIT 输入文件生成
//!
//! 有序变量列表渲染为 run.input 文本；另生成 ABINIT 读取的
//! files 文件（输入/输出路径 + 数据前缀 + 赝势列表）。
//! 不覆盖完整的输入语法，只提供驱动工作流所需的子集。
//!
//! ## 依赖关系
//! - 被 `task/task.rs`, `workflow/calculations.rs` 使用
//! - 使用 `models/structure.rs`

use std::path::{Path, PathBuf};

use crate::abinit::ANGSTROM_TO_BOHR;
use crate::error::Result;
use crate::models::structure::{atomic_number, Crystal};

/// ABINIT 输入规格：注释头 + 有序变量表 + 赝势列表
///
/// 变量保持插入顺序写出；同名变量后设者覆盖前者的值。
#[derive(Debug, Clone)]
pub struct AbinitInput {
    /// 写在文件头部的注释
    comment: String,

    /// (变量名, 已格式化的值)
    variables: Vec<(String, String)>,

    /// 赝势文件路径，顺序与 znucl 一致
    pseudos: Vec<PathBuf>,
}

impl AbinitInput {
    pub fn new(comment: impl Into<String>) -> Self {
        AbinitInput {
            comment: comment.into(),
            variables: Vec::new(),
            pseudos: Vec::new(),
        }
    }

    /// 设置单值变量；已存在则覆盖
    pub fn set(&mut self, name: &str, value: impl ToString) -> &mut Self {
        let value = value.to_string();
        if let Some(entry) = self.variables.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.variables.push((name.to_string(), value));
        }
        self
    }

    /// 设置数值数组变量（空格分隔）
    pub fn set_array(&mut self, name: &str, values: &[f64]) -> &mut Self {
        let rendered = values
            .iter()
            .map(|v| format!("{:.10}", v))
            .collect::<Vec<_>>()
            .join("  ");
        self.set(name, rendered)
    }

    /// 查询变量值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// 赝势列表
    pub fn pseudos(&self) -> &[PathBuf] {
        &self.pseudos
    }

    pub fn add_pseudo(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.pseudos.push(path.into());
        self
    }

    /// 从晶体结构填入结构变量
    /// (acell/rprim/natom/ntypat/znucl/typat/xred)
    pub fn set_structure(&mut self, crystal: &Crystal) -> Result<()> {
        let species = crystal.species();

        // 晶格向量以 Bohr 写出，acell 取单位缩放
        self.set("acell", "1.0 1.0 1.0");

        let m = crystal.lattice.matrix;
        let rprim = m
            .iter()
            .map(|row| {
                format!(
                    "  {:18.10}  {:18.10}  {:18.10}",
                    row[0] * ANGSTROM_TO_BOHR,
                    row[1] * ANGSTROM_TO_BOHR,
                    row[2] * ANGSTROM_TO_BOHR
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.set("rprim", format!("\n{}", rprim));

        self.set("natom", crystal.atoms.len());
        self.set("ntypat", species.len());

        let znucl = species
            .iter()
            .map(|s| atomic_number(s).map(|z| z.to_string()))
            .collect::<Result<Vec<_>>>()?
            .join(" ");
        self.set("znucl", znucl);

        let typat = crystal
            .type_indices()
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.set("typat", typat);

        let xred = crystal
            .atoms
            .iter()
            .map(|a| {
                format!(
                    "  {:18.10}  {:18.10}  {:18.10}",
                    a.position[0], a.position[1], a.position[2]
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.set("xred", format!("\n{}", xred));

        Ok(())
    }

    /// 追加上游任务输出路径的控制变量（getden_path 等）
    pub fn add_control_vars(&mut self, vars: &[(String, String)]) {
        for (name, path) in vars {
            self.set(name, format!("\"{}\"", path));
        }
    }

    /// 渲染为 run.input 文本
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        for comment_line in self.comment.lines() {
            lines.push(format!("# {}", comment_line));
        }
        lines.push(String::new());

        for (name, value) in &self.variables {
            lines.push(format!("{} {}", name, value));
        }
        lines.push(String::new());

        lines.join("\n")
    }
}

impl std::fmt::Display for AbinitInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// 生成 ABINIT 的 files 文件内容
///
/// 五行前缀（输入、输出、in/out/tmp 数据前缀），随后每行一个
/// 赝势文件路径。
pub fn files_file_string(
    input_file: &Path,
    output_file: &Path,
    idata_prefix: &Path,
    odata_prefix: &Path,
    tdata_prefix: &Path,
    pseudos: &[PathBuf],
) -> String {
    let mut lines = vec![
        input_file.display().to_string(),
        output_file.display().to_string(),
        idata_prefix.display().to_string(),
        odata_prefix.display().to_string(),
        tdata_prefix.display().to_string(),
    ];

    for pseudo in pseudos {
        lines.push(pseudo.display().to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::structure::{Atom, Lattice};

    #[test]
    fn test_set_overwrites_existing() {
        let mut input = AbinitInput::new("test");
        input.set("ecut", 10);
        input.set("ecut", 20);

        assert_eq!(input.get("ecut"), Some("20"));
        assert_eq!(input.render().matches("ecut").count(), 1);
    }

    #[test]
    fn test_variables_keep_insertion_order() {
        let mut input = AbinitInput::new("order");
        input.set("ecut", 15);
        input.set("nband", 8);
        input.set("toldfe", "1.0d-8");

        let text = input.render();
        let ecut_pos = text.find("ecut").unwrap();
        let nband_pos = text.find("nband").unwrap();
        let toldfe_pos = text.find("toldfe").unwrap();
        assert!(ecut_pos < nband_pos && nband_pos < toldfe_pos);
    }

    #[test]
    fn test_set_structure() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let atoms = vec![
            Atom::new("Ti", [0.0, 0.0, 0.0]),
            Atom::new("O", [0.5, 0.5, 0.0]),
            Atom::new("O", [0.5, 0.0, 0.5]),
        ];
        let crystal = Crystal::new("TiO2", lattice, atoms);

        let mut input = AbinitInput::new("structure");
        input.set_structure(&crystal).unwrap();

        assert_eq!(input.get("natom"), Some("3"));
        assert_eq!(input.get("ntypat"), Some("2"));
        assert_eq!(input.get("znucl"), Some("22 8"));
        assert_eq!(input.get("typat"), Some("1 2 2"));
        assert!(input.get("rprim").unwrap().contains("7.55890"));
    }

    #[test]
    fn test_set_structure_unknown_element() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let crystal = Crystal::new("Xq", lattice, vec![Atom::new("Xq", [0.0, 0.0, 0.0])]);

        let mut input = AbinitInput::new("bad");
        assert!(input.set_structure(&crystal).is_err());
    }

    #[test]
    fn test_control_vars_are_quoted() {
        let mut input = AbinitInput::new("deps");
        input.add_control_vars(&[(
            "getden_path".to_string(),
            "/work/scf/output/out_DEN".to_string(),
        )]);

        assert_eq!(
            input.get("getden_path"),
            Some("\"/work/scf/output/out_DEN\"")
        );
    }

    #[test]
    fn test_files_file_layout() {
        let pseudos = vec![PathBuf::from("/psp/Si.psp8")];
        let text = files_file_string(
            Path::new("/w/run.input"),
            Path::new("/w/run.output"),
            Path::new("/w/in"),
            Path::new("/w/output/out"),
            Path::new("/w/temporary/tmp"),
            &pseudos,
        );

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "/w/run.input");
        assert_eq!(lines[3], "/w/output/out");
        assert_eq!(lines[5], "/psp/Si.psp8");
    }

    #[test]
    fn test_render_comment_header() {
        let input = AbinitInput::new("SCF ground state\nsecond line");
        let text = input.render();
        assert!(text.starts_with("# SCF ground state\n# second line"));
    }
}
