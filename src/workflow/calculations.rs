//! # 工作流工厂
//!
//! 面向调用方的高层入口：由结构与少量参数装配出基态、能带、
//! G0W0 工作流。输入变量只覆盖驱动这些链路所需的子集。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `workflow/mod.rs`, `abinit/input.rs`, `task/links.rs`

use std::path::{Path, PathBuf};

use crate::abinit::AbinitInput;
use crate::error::Result;
use crate::models::Crystal;
use crate::task::{OdataKind, RunMode};
use crate::workflow::Workflow;

/// 能带路径的默认高对称点 (简立方/四方惯用段 Γ-X-M-Γ)
pub const DEFAULT_KPATH: &[(&str, [f64; 3])] = &[
    ("G", [0.0, 0.0, 0.0]),
    ("X", [0.5, 0.0, 0.0]),
    ("M", [0.5, 0.5, 0.0]),
    ("G", [0.0, 0.0, 0.0]),
];

/// 0.1 eV 的 Fermi-Dirac 展宽 (Ha)
const TSMEAR_HA: f64 = 0.003675;

/// 公共输入底座：结构变量 + 截断能 + 赝势
fn base_input(
    comment: &str,
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
) -> Result<AbinitInput> {
    let mut input = AbinitInput::new(comment);
    input.set_structure(crystal)?;
    input.set("ecut", ecut);
    for pseudo in pseudos {
        input.add_pseudo(pseudo.clone());
    }
    Ok(input)
}

/// 基态 SCF 输入；prtden 打开以便下游通过 DEN 依赖复用密度
pub fn scf_input(
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    ngkpt: [u32; 3],
) -> Result<AbinitInput> {
    let mut input = base_input(
        &format!("{} ground state", crystal.name),
        crystal,
        pseudos,
        ecut,
    )?;

    input.set("kptopt", 1);
    input.set("ngkpt", format!("{} {} {}", ngkpt[0], ngkpt[1], ngkpt[2]));
    input.set("nshiftk", 1);
    input.set_array("shiftk", &[0.0, 0.0, 0.0]);
    input.set("occopt", 3);
    input.set("tsmear", TSMEAR_HA);
    input.set("toldfe", "1.0d-8");
    input.set("nstep", 50);
    input.set("prtden", 1);

    Ok(input)
}

/// 沿高对称线的非自洽能带输入
///
/// `kpath` 为高对称点序列；kptopt 取负的段数，配合 kptbounds
/// 与 ndivsm 生成路径。enunit 置 1 使本征值以 eV 打印。
pub fn nscf_bands_input(
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    nband: u32,
    ndivsm: u32,
    kpath: &[(&str, [f64; 3])],
) -> Result<AbinitInput> {
    let mut input = base_input(
        &format!("{} band structure", crystal.name),
        crystal,
        pseudos,
        ecut,
    )?;

    input.set("iscf", -2);
    input.set("nband", nband);
    input.set("kptopt", -((kpath.len() as i64) - 1));

    let bounds = kpath
        .iter()
        .map(|(_, k)| format!("  {:8.4}  {:8.4}  {:8.4}", k[0], k[1], k[2]))
        .collect::<Vec<_>>()
        .join("\n");
    input.set("kptbounds", format!("\n{}", bounds));

    input.set("ndivsm", ndivsm);
    input.set("tolwfr", "1.0d-12");
    input.set("enunit", 1);

    Ok(input)
}

/// 规则网格上的非自洽输入（GW 链路的波函数源）
pub fn nscf_mesh_input(
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    nband: u32,
    ngkpt: [u32; 3],
) -> Result<AbinitInput> {
    let mut input = base_input(
        &format!("{} nscf mesh", crystal.name),
        crystal,
        pseudos,
        ecut,
    )?;

    input.set("iscf", -2);
    input.set("nband", nband);
    input.set("kptopt", 1);
    input.set("ngkpt", format!("{} {} {}", ngkpt[0], ngkpt[1], ngkpt[2]));
    input.set("nshiftk", 1);
    input.set_array("shiftk", &[0.0, 0.0, 0.0]);
    input.set("tolwfr", "1.0d-12");
    input.set("istwfk", "*1");

    Ok(input)
}

/// 屏蔽矩阵计算输入 (optdriver 3)
pub fn screening_input(
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    nband: u32,
    ecuteps: f64,
) -> Result<AbinitInput> {
    let mut input = base_input(
        &format!("{} screening", crystal.name),
        crystal,
        pseudos,
        ecut,
    )?;

    input.set("optdriver", 3);
    input.set("nband", nband);
    input.set("ecuteps", ecuteps);
    input.set("inclvkb", 2);
    input.set("istwfk", "*1");

    Ok(input)
}

/// 自能计算输入 (optdriver 4)
pub fn sigma_input(
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    nband: u32,
    ecutsigx: f64,
) -> Result<AbinitInput> {
    let mut input = base_input(
        &format!("{} self-energy", crystal.name),
        crystal,
        pseudos,
        ecut,
    )?;

    input.set("optdriver", 4);
    input.set("nband", nband);
    input.set("ecutsigx", ecutsigx);
    input.set("ppmodel", 1);
    input.set("istwfk", "*1");

    Ok(input)
}

/// 单任务基态工作流
pub fn scf_calculation(
    workdir: &Path,
    runmode: RunMode,
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    ngkpt: [u32; 3],
) -> Result<Workflow> {
    let mut wf = Workflow::new(workdir, runmode);
    wf.register(scf_input(crystal, pseudos, ecut, ngkpt)?, "scf", &[]);
    Ok(wf)
}

/// 能带工作流：SCF + 依赖其密度的 NSCF 能带任务
#[allow(clippy::too_many_arguments)]
pub fn bandstructure(
    workdir: &Path,
    runmode: RunMode,
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    ngkpt: [u32; 3],
    nscf_nband: u32,
    ndivsm: u32,
) -> Result<Workflow> {
    let mut wf = Workflow::new(workdir, runmode);

    let scf = wf.register(scf_input(crystal, pseudos, ecut, ngkpt)?, "scf", &[]);

    let nscf = nscf_bands_input(crystal, pseudos, ecut, nscf_nband, ndivsm, DEFAULT_KPATH)?;
    wf.register(nscf, "nscf", &[scf.with_odata(&[OdataKind::Den])]);

    Ok(wf)
}

/// G0W0 工作流：SCF + NSCF(波函数) + 屏蔽 + 自能
#[allow(clippy::too_many_arguments)]
pub fn g0w0(
    workdir: &Path,
    runmode: RunMode,
    crystal: &Crystal,
    pseudos: &[PathBuf],
    ecut: f64,
    ngkpt: [u32; 3],
    nscf_nband: u32,
    ecuteps: f64,
    ecutsigx: f64,
) -> Result<Workflow> {
    let mut wf = Workflow::new(workdir, runmode);

    let scf = wf.register(scf_input(crystal, pseudos, ecut, ngkpt)?, "scf", &[]);

    let nscf = wf.register(
        nscf_mesh_input(crystal, pseudos, ecut, nscf_nband, ngkpt)?,
        "nscf",
        &[scf.with_odata(&[OdataKind::Den])],
    );

    let scr = wf.register(
        screening_input(crystal, pseudos, ecut, nscf_nband, ecuteps)?,
        "screening",
        &[nscf.with_odata(&[OdataKind::Wfk])],
    );

    wf.register(
        sigma_input(crystal, pseudos, ecut, nscf_nband, ecutsigx)?,
        "sigma",
        &[
            nscf.with_odata(&[OdataKind::Wfk]),
            scr.with_odata(&[OdataKind::Scr]),
        ],
    );

    Ok(wf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn silicon() -> Crystal {
        let lattice = Lattice::from_vectors([[5.43, 0.0, 0.0], [0.0, 5.43, 0.0], [0.0, 0.0, 5.43]]);
        Crystal::new(
            "Si2",
            lattice,
            vec![
                Atom::new("Si", [0.0, 0.0, 0.0]),
                Atom::new("Si", [0.25, 0.25, 0.25]),
            ],
        )
    }

    fn pseudos() -> Vec<PathBuf> {
        vec![PathBuf::from("/psp/Si.psp8")]
    }

    #[test]
    fn test_scf_input_variables() {
        let input = scf_input(&silicon(), &pseudos(), 15.0, [4, 4, 4]).unwrap();

        assert_eq!(input.get("ngkpt"), Some("4 4 4"));
        assert_eq!(input.get("prtden"), Some("1"));
        assert_eq!(input.get("natom"), Some("2"));
        assert_eq!(input.pseudos().len(), 1);
    }

    #[test]
    fn test_nscf_bands_input_path() {
        let input =
            nscf_bands_input(&silicon(), &pseudos(), 15.0, 12, 10, DEFAULT_KPATH).unwrap();

        assert_eq!(input.get("iscf"), Some("-2"));
        // 四个端点 → 三段
        assert_eq!(input.get("kptopt"), Some("-3"));
        assert!(input.get("kptbounds").unwrap().contains("0.5000"));
        assert_eq!(input.get("enunit"), Some("1"));
    }

    #[test]
    fn test_bandstructure_workflow_links() {
        let dir = tempfile::tempdir().unwrap();
        let wf = bandstructure(
            dir.path(),
            RunMode::default(),
            &silicon(),
            &pseudos(),
            15.0,
            [4, 4, 4],
            12,
            10,
        )
        .unwrap();

        assert_eq!(wf.len(), 2);
        let nscf = wf.task(1).unwrap();
        assert!(nscf
            .input()
            .get("getden_path")
            .unwrap()
            .contains("scf/output/out_DEN"));
    }

    #[test]
    fn test_g0w0_workflow_chain() {
        let dir = tempfile::tempdir().unwrap();
        let wf = g0w0(
            dir.path(),
            RunMode::default(),
            &silicon(),
            &pseudos(),
            15.0,
            [2, 2, 2],
            32,
            6.0,
            12.0,
        )
        .unwrap();

        assert_eq!(wf.len(), 4);

        let scr = wf.task(2).unwrap();
        assert_eq!(scr.input().get("optdriver"), Some("3"));
        assert!(scr
            .input()
            .get("getwfk_path")
            .unwrap()
            .contains("nscf/output/out_WFK"));

        let sigma = wf.task(3).unwrap();
        assert_eq!(sigma.input().get("optdriver"), Some("4"));
        assert!(sigma
            .input()
            .get("getwfk_path")
            .unwrap()
            .contains("nscf/output/out_WFK"));
        assert!(sigma
            .input()
            .get("getscr_path")
            .unwrap()
            .contains("screening/output/out_SCR"));
    }
}
