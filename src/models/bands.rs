//! # 能带结构数据模型
//!
//! 定义 k 点与能带容器，支持沿高对称线的能带分析：
//! 价带顶 (VBM)、导带底 (CBM)、带隙、金属性判断、分支重组。
//!
//! ## 依赖关系
//! - 被 `commands/bands.rs` 使用
//! - 使用 `models/structure.rs` 的倒易晶格

use serde::{Deserialize, Serialize};

use crate::error::{AbitoolError, Result};
use crate::models::structure::Lattice;

/// 判定两个 k 点坐标相同的容差
const KPOINT_COORD_TOL: f64 = 1e-4;

/// 判定能带简并的能量容差 (eV)
const BAND_DEGENERACY_TOL: f64 = 1e-3;

/// 倒易空间中的采样点
///
/// 分数坐标相对给定的倒易晶格，笛卡尔坐标在构造时一并算出。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpoint {
    /// 分数坐标
    pub frac_coords: [f64; 3],

    /// 笛卡尔坐标 (Å⁻¹)
    pub cart_coords: [f64; 3],

    /// 高对称点标签（如 "G", "X"）
    pub label: Option<String>,
}

impl Kpoint {
    pub fn new(frac_coords: [f64; 3], rec_lattice: &Lattice, label: Option<String>) -> Self {
        Kpoint {
            frac_coords,
            cart_coords: rec_lattice.frac_to_cart(frac_coords),
            label,
        }
    }
}

/// 单条能带：每个 k 点一个本征值和占据数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    /// 能量 (eV)，与 k 点列表一一对应
    pub energies: Vec<f64>,

    /// 占据数，与 k 点列表一一对应
    pub occupations: Vec<f64>,
}

/// 能带边缘（VBM 或 CBM）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandEdge {
    /// 共享该边缘的能带序号（可能简并）
    pub band_indices: Vec<usize>,

    /// k 点序号
    pub kpoint_index: usize,

    /// 能量 (eV)
    pub energy: f64,

    /// k 点标签
    pub label: Option<String>,
}

/// 带隙信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandGap {
    /// 带隙能量 (eV)，金属为 0
    pub energy: f64,

    /// 是否直接带隙
    pub direct: bool,

    /// 跃迁标记（如 "G-X"），金属为 None
    pub transition: Option<String>,
}

/// 最通用的能带结构：k 点列表 + 每条能带的能量与占据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandStructure {
    /// 全部 k 点（顺序有意义）
    pub kpoints: Vec<Kpoint>,

    /// 所有能带，外层索引为带序号
    pub bands: Vec<Band>,

    /// 费米能 (eV)
    pub efermi: f64,

    /// 倒易晶格
    pub rec_lattice: Lattice,
}

impl BandStructure {
    /// 从分数坐标与标签表构造
    ///
    /// `labels` 中的每项 (名称, 分数坐标) 与 k 点按坐标匹配。
    pub fn new(
        kpoint_coords: &[[f64; 3]],
        bands: Vec<Band>,
        rec_lattice: Lattice,
        efermi: f64,
        labels: &[(String, [f64; 3])],
    ) -> Result<Self> {
        for (i, band) in bands.iter().enumerate() {
            if band.energies.len() != kpoint_coords.len() {
                return Err(AbitoolError::InvalidArgument(format!(
                    "Band {} has {} energies for {} k-points",
                    i,
                    band.energies.len(),
                    kpoint_coords.len()
                )));
            }
        }

        let kpoints = kpoint_coords
            .iter()
            .map(|&coords| {
                let label = labels
                    .iter()
                    .find(|(_, lc)| coords_close(coords, *lc))
                    .map(|(name, _)| name.clone());
                Kpoint::new(coords, &rec_lattice, label)
            })
            .collect();

        Ok(BandStructure {
            kpoints,
            bands,
            efermi,
            rec_lattice,
        })
    }

    /// 能带数
    pub fn nb_bands(&self) -> usize {
        self.bands.len()
    }

    /// 检查费米能级是否穿过某条能带（金属判据）
    pub fn is_metal(&self) -> bool {
        for band in &self.bands {
            let below = band.energies.iter().any(|&e| e < self.efermi);
            let above = band.energies.iter().any(|&e| e > self.efermi);
            if below && above {
                return true;
            }
        }
        false
    }

    /// 价带顶：费米能以下的最高本征值
    pub fn vbm(&self) -> Option<BandEdge> {
        self.band_edge(|e, ef| e < ef, |a, b| a > b)
    }

    /// 导带底：费米能以上的最低本征值
    pub fn cbm(&self) -> Option<BandEdge> {
        self.band_edge(|e, ef| e > ef, |a, b| a < b)
    }

    fn band_edge(
        &self,
        side: impl Fn(f64, f64) -> bool,
        better: impl Fn(f64, f64) -> bool,
    ) -> Option<BandEdge> {
        let mut best: Option<(f64, usize)> = None;

        for band in &self.bands {
            for (j, &e) in band.energies.iter().enumerate() {
                if side(e, self.efermi) && best.map_or(true, |(be, _)| better(e, be)) {
                    best = Some((e, j));
                }
            }
        }

        let (energy, kpoint_index) = best?;

        // 收集共享该边缘的所有（可能简并的）能带
        let band_indices = self
            .bands
            .iter()
            .enumerate()
            .filter(|(_, b)| (b.energies[kpoint_index] - energy).abs() < BAND_DEGENERACY_TOL)
            .map(|(i, _)| i)
            .collect();

        Some(BandEdge {
            band_indices,
            kpoint_index,
            energy,
            label: self.kpoints[kpoint_index].label.clone(),
        })
    }

    /// 带隙：金属返回零隙
    pub fn band_gap(&self) -> BandGap {
        if self.is_metal() {
            return BandGap {
                energy: 0.0,
                direct: false,
                transition: None,
            };
        }

        let (vbm, cbm) = match (self.vbm(), self.cbm()) {
            (Some(v), Some(c)) => (v, c),
            _ => {
                return BandGap {
                    energy: 0.0,
                    direct: false,
                    transition: None,
                }
            }
        };

        let vk = &self.kpoints[vbm.kpoint_index];
        let ck = &self.kpoints[cbm.kpoint_index];

        let same_label = vk.label.is_some() && vk.label == ck.label;
        let direct = same_label || cart_distance(vk.cart_coords, ck.cart_coords) < 0.01;

        let describe = |k: &Kpoint| {
            k.label.clone().unwrap_or_else(|| {
                format!(
                    "({:.3},{:.3},{:.3})",
                    k.frac_coords[0], k.frac_coords[1], k.frac_coords[2]
                )
            })
        };

        BandGap {
            energy: cbm.energy - vbm.energy,
            direct,
            transition: Some(format!("{}-{}", describe(vk), describe(ck))),
        }
    }
}

/// 能带分支：k 路径上两个高对称点之间的一段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub start_index: usize,
    pub end_index: usize,
    pub name: String,
}

/// 沿高对称线的能带结构
///
/// 在通用容器上附加沿路径的累积距离和分支划分；
/// 相邻的两个标记点之间视为路径断点，不计入距离。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandStructureSymmLine {
    /// 底层能带数据
    pub bs: BandStructure,

    /// 每个 k 点沿路径的累积距离
    pub distances: Vec<f64>,

    /// 分支列表（如 "G-X"）
    pub branches: Vec<Branch>,
}

impl BandStructureSymmLine {
    pub fn new(bs: BandStructure) -> Self {
        let mut distances = Vec::with_capacity(bs.kpoints.len());
        let mut branches_tmp: Vec<Vec<usize>> = Vec::new();
        let mut one_group: Vec<usize> = Vec::new();

        let mut previous_distance = 0.0;
        let mut previous_label: Option<String> = bs.kpoints.first().and_then(|k| k.label.clone());
        let mut previous_cart = bs.kpoints.first().map(|k| k.cart_coords);

        for (i, kpoint) in bs.kpoints.iter().enumerate() {
            let label = kpoint.label.clone();

            // 两个连续标记点之间为断点，距离不增加
            let d = if label.is_some() && previous_label.is_some() {
                previous_distance
            } else {
                let prev = previous_cart.unwrap_or(kpoint.cart_coords);
                previous_distance + cart_distance(kpoint.cart_coords, prev)
            };
            distances.push(d);
            previous_distance = d;
            previous_cart = Some(kpoint.cart_coords);

            if label.is_some() && previous_label.is_some() && !one_group.is_empty() {
                branches_tmp.push(std::mem::take(&mut one_group));
            }
            previous_label = label;
            one_group.push(i);
        }

        if !one_group.is_empty() {
            branches_tmp.push(one_group);
        }

        let branches = branches_tmp
            .into_iter()
            .map(|group| {
                let start = group[0];
                let end = group[group.len() - 1];
                let name = format!(
                    "{}-{}",
                    bs.kpoints[start].label.as_deref().unwrap_or("?"),
                    bs.kpoints[end].label.as_deref().unwrap_or("?")
                );
                Branch {
                    start_index: start,
                    end_index: end,
                    name,
                }
            })
            .collect();

        BandStructureSymmLine {
            bs,
            distances,
            branches,
        }
    }

    /// 给定 k 点序号所属的分支名（路径端点可能属于多个分支）
    pub fn branch_names(&self, index: usize) -> Vec<&str> {
        self.branches
            .iter()
            .filter(|b| b.start_index <= index && index <= b.end_index)
            .map(|b| b.name.as_str())
            .collect()
    }

    /// 将按分支拆分计算的多段能带重组为一个整体
    ///
    /// 未给定费米能时取各段的平均值。
    pub fn reconstruct(pieces: &[BandStructureSymmLine], efermi: Option<f64>) -> Result<Self> {
        let first = pieces
            .first()
            .ok_or_else(|| AbitoolError::InvalidArgument("No band segments to merge".into()))?;

        let nb_bands = first.bs.nb_bands();
        for p in pieces {
            if p.bs.nb_bands() != nb_bands {
                return Err(AbitoolError::InvalidArgument(
                    "Band segments have different band counts".into(),
                ));
            }
        }

        let efermi = efermi
            .unwrap_or_else(|| pieces.iter().map(|p| p.bs.efermi).sum::<f64>() / pieces.len() as f64);

        let mut kpoint_coords: Vec<[f64; 3]> = Vec::new();
        let mut labels: Vec<(String, [f64; 3])> = Vec::new();
        for p in pieces {
            for k in &p.bs.kpoints {
                kpoint_coords.push(k.frac_coords);
                if let Some(ref name) = k.label {
                    if !labels.iter().any(|(n, c)| n == name && coords_close(*c, k.frac_coords)) {
                        labels.push((name.clone(), k.frac_coords));
                    }
                }
            }
        }

        let bands = (0..nb_bands)
            .map(|i| {
                let mut energies = Vec::new();
                let mut occupations = Vec::new();
                for p in pieces {
                    energies.extend_from_slice(&p.bs.bands[i].energies);
                    occupations.extend_from_slice(&p.bs.bands[i].occupations);
                }
                Band {
                    energies,
                    occupations,
                }
            })
            .collect();

        let bs = BandStructure::new(
            &kpoint_coords,
            bands,
            first.bs.rec_lattice.clone(),
            efermi,
            &labels,
        )?;

        Ok(BandStructureSymmLine::new(bs))
    }
}

fn coords_close(a: [f64; 3], b: [f64; 3]) -> bool {
    cart_distance(a, b) < KPOINT_COORD_TOL
}

fn cart_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}
