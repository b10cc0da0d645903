//! # bands 命令实现
//!
//! 从 ABINIT 主输出解析本征值块，组装沿高对称线的能带结构，
//! 汇报 VBM/CBM/带隙/金属性，并可选绘图与 JSON 导出。
//!
//! ## 依赖关系
//! - 使用 `cli/bands.rs` 定义的参数
//! - 使用 `abinit/output.rs`, `models/bands.rs`
//! - 使用 `utils/output.rs`, `plotters`

use std::path::Path;

use tabled::{Table, Tabled};

use crate::abinit::{parse_eigenvalue_blocks, parse_output};
use crate::cli::bands::BandsArgs;
use crate::error::{AbitoolError, Result};
use crate::models::bands::{Band, BandStructure, BandStructureSymmLine};
use crate::models::Lattice;
use crate::utils::output;

/// 摘要表格行
#[derive(Debug, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// 执行 bands 命令
pub fn execute(args: BandsArgs) -> Result<()> {
    output::print_header("Band Structure Analysis");

    if !args.output.exists() {
        return Err(AbitoolError::FileNotFound {
            path: args.output.display().to_string(),
        });
    }

    // 费米能：命令行优先，否则取主输出
    let efermi = match args.efermi {
        Some(e) => e,
        None => parse_output(&args.output)?
            .fermi_ev
            .ok_or_else(|| {
                AbitoolError::InvalidArgument(
                    "No Fermi energy in the output, provide --efermi".to_string(),
                )
            })?,
    };

    let blocks = parse_eigenvalue_blocks(&args.output)?;
    output::print_info(&format!(
        "Parsed {} k-points, Fermi energy {:.4} eV",
        blocks.len(),
        efermi
    ));

    let nband = blocks
        .iter()
        .map(|b| b.eigenvalues.len())
        .min()
        .unwrap_or(0);
    if nband == 0 {
        return Err(AbitoolError::ParseError {
            format: "abinit output".to_string(),
            path: args.output.display().to_string(),
            reason: "Empty eigenvalue block".to_string(),
        });
    }
    if blocks.iter().any(|b| b.eigenvalues.len() != nband) {
        output::print_warning(&format!(
            "Uneven band counts across k-points, truncating to {}",
            nband
        ));
    }

    let kpoint_coords: Vec<[f64; 3]> = blocks.iter().map(|b| b.kpt).collect();
    let bands: Vec<Band> = (0..nband)
        .map(|i| Band {
            energies: blocks.iter().map(|b| b.eigenvalues[i]).collect(),
            occupations: vec![0.0; blocks.len()],
        })
        .collect();

    let rec_lattice = parse_rec_lattice(args.rec_lattice.as_deref())?;
    let labels = parse_labels(&args.labels)?;

    let bs = BandStructure::new(&kpoint_coords, bands, rec_lattice, efermi, &labels)?;
    let symm = BandStructureSymmLine::new(bs);

    print_summary(&symm, efermi);

    if let Some(ref json_path) = args.output_json {
        let text = serde_json::to_string_pretty(&symm)?;
        std::fs::write(json_path, text).map_err(|e| AbitoolError::FileWriteError {
            path: json_path.display().to_string(),
            source: e,
        })?;
        output::print_success(&format!("Band data saved to '{}'", json_path.display()));
    }

    if !args.no_plot {
        plot_bands(&symm, &args.output_plot, args.width, args.height)?;
        output::print_success(&format!(
            "Band structure plot saved to '{}'",
            args.output_plot.display()
        ));
    }

    Ok(())
}

/// 打印能带摘要表
fn print_summary(symm: &BandStructureSymmLine, efermi: f64) {
    let mut rows = vec![
        SummaryRow {
            quantity: "Bands".to_string(),
            value: symm.bs.nb_bands().to_string(),
        },
        SummaryRow {
            quantity: "k-points".to_string(),
            value: symm.bs.kpoints.len().to_string(),
        },
        SummaryRow {
            quantity: "Fermi energy (eV)".to_string(),
            value: format!("{:.4}", efermi),
        },
        SummaryRow {
            quantity: "Metallic".to_string(),
            value: symm.bs.is_metal().to_string(),
        },
    ];

    if !symm.branches.is_empty() {
        let names: Vec<&str> = symm.branches.iter().map(|b| b.name.as_str()).collect();
        rows.push(SummaryRow {
            quantity: "Path".to_string(),
            value: names.join(" | "),
        });
    }

    if !symm.bs.is_metal() {
        let gap = symm.bs.band_gap();
        rows.push(SummaryRow {
            quantity: "Band gap (eV)".to_string(),
            value: format!("{:.4}", gap.energy),
        });
        rows.push(SummaryRow {
            quantity: "Direct".to_string(),
            value: gap.direct.to_string(),
        });
        if let Some(transition) = gap.transition {
            rows.push(SummaryRow {
                quantity: "Transition".to_string(),
                value: transition,
            });
        }

        if let Some(vbm) = symm.bs.vbm() {
            rows.push(SummaryRow {
                quantity: "VBM (eV)".to_string(),
                value: format!("{:.4}", vbm.energy),
            });
        }
        if let Some(cbm) = symm.bs.cbm() {
            rows.push(SummaryRow {
                quantity: "CBM (eV)".to_string(),
                value: format!("{:.4}", cbm.energy),
            });
        }
    }

    println!("{}", Table::new(&rows));
}

/// 解析倒易晶格参数；缺省取单位立方
fn parse_rec_lattice(expr: Option<&str>) -> Result<Lattice> {
    let expr = match expr {
        Some(e) => e,
        None => {
            return Ok(Lattice::from_vectors([
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ]))
        }
    };

    let rows: Vec<Vec<f64>> = expr
        .split(';')
        .map(|row| {
            row.split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
        })
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| AbitoolError::InvalidArgument(format!("Bad lattice '{}'", expr)))?;

    if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
        return Err(AbitoolError::InvalidArgument(format!(
            "Lattice needs 3x3 values: '{}'",
            expr
        )));
    }

    Ok(Lattice::from_vectors([
        [rows[0][0], rows[0][1], rows[0][2]],
        [rows[1][0], rows[1][1], rows[1][2]],
        [rows[2][0], rows[2][1], rows[2][2]],
    ]))
}

/// 解析 'NAME=x,y,z' 形式的高对称点标签
fn parse_labels(labels: &[String]) -> Result<Vec<(String, [f64; 3])>> {
    labels
        .iter()
        .map(|spec| {
            let (name, coords) = spec
                .split_once('=')
                .ok_or_else(|| AbitoolError::InvalidLabel(spec.clone()))?;

            let values: Vec<f64> = coords
                .split(',')
                .map(|v| v.trim().parse())
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| AbitoolError::InvalidLabel(spec.clone()))?;

            if values.len() != 3 {
                return Err(AbitoolError::InvalidLabel(spec.clone()));
            }

            Ok((name.trim().to_string(), [values[0], values[1], values[2]]))
        })
        .collect()
}

/// 绘制能带图
fn plot_bands(
    symm: &BandStructureSymmLine,
    output_path: &Path,
    width: u32,
    height: u32,
) -> Result<()> {
    use plotters::prelude::*;

    let x_max = symm.distances.last().copied().unwrap_or(1.0).max(1e-12);

    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for band in &symm.bs.bands {
        for &e in &band.energies {
            y_min = y_min.min(e);
            y_max = y_max.max(e);
        }
    }
    let y_margin = (y_max - y_min).abs().max(1e-6) * 0.05;

    let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| AbitoolError::Other(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Band Structure", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_max, (y_min - y_margin)..(y_max + y_margin))
        .map_err(|e| AbitoolError::Other(e.to_string()))?;

    chart
        .configure_mesh()
        .x_desc("Wave vector")
        .y_desc("Energy (eV)")
        .draw()
        .map_err(|e| AbitoolError::Other(e.to_string()))?;

    // 各条能带
    for band in &symm.bs.bands {
        chart
            .draw_series(LineSeries::new(
                symm.distances
                    .iter()
                    .zip(band.energies.iter())
                    .map(|(&x, &y)| (x, y)),
                BLUE.stroke_width(1),
            ))
            .map_err(|e| AbitoolError::Other(e.to_string()))?;
    }

    // 费米能级参考线
    chart
        .draw_series(LineSeries::new(
            [(0.0, symm.bs.efermi), (x_max, symm.bs.efermi)],
            RED.stroke_width(1),
        ))
        .map_err(|e| AbitoolError::Other(e.to_string()))?
        .label("E_F")
        .legend(|(x, y)| {
            plotters::element::PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(1))
        });

    // 高对称点处的竖直分隔线
    for branch in &symm.branches {
        for idx in [branch.start_index, branch.end_index] {
            let x = symm.distances[idx];
            chart
                .draw_series(LineSeries::new(
                    [(x, y_min - y_margin), (x, y_max + y_margin)],
                    BLACK.mix(0.4).stroke_width(1),
                ))
                .map_err(|e| AbitoolError::Other(e.to_string()))?;
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|e| AbitoolError::Other(e.to_string()))?;

    root.present()
        .map_err(|e| AbitoolError::Other(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels(&["G=0,0,0".to_string(), "X = 0.5, 0, 0".to_string()]).unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].0, "G");
        assert_eq!(labels[1].0, "X");
        assert_eq!(labels[1].1, [0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_parse_labels_rejects_bad_specs() {
        assert!(parse_labels(&["G".to_string()]).is_err());
        assert!(parse_labels(&["G=0,0".to_string()]).is_err());
        assert!(parse_labels(&["G=a,b,c".to_string()]).is_err());
    }

    #[test]
    fn test_parse_rec_lattice_default() {
        let lattice = parse_rec_lattice(None).unwrap();
        assert_eq!(lattice.matrix[0], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_parse_rec_lattice_explicit() {
        let lattice = parse_rec_lattice(Some("1,0,0;0,2,0;0,0,3")).unwrap();
        assert_eq!(lattice.matrix[1][1], 2.0);
        assert_eq!(lattice.matrix[2][2], 3.0);

        assert!(parse_rec_lattice(Some("1,0;0,2")).is_err());
    }
}
