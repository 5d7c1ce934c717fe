//! 从表面网格与体素掩膜抽取规划用点云.
//!
//! 三类点云: 皮肤进针候选 (Ps), 危险器官障碍采样 (Po), 肿瘤内部采样 (Pt).
//! 三者都在一次规划开始时抽取一次, 之后只读.

use std::collections::HashSet;

use crate::consts::mask;
use crate::geom::SurfaceMesh;
use crate::volume::MaskVolume;
use crate::WorldPoint;

/// 患者体位. 决定皮肤点云的哪个半侧可作为进针候选.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyOrientation {
    /// 仰卧 (面朝上), 从腹侧进针: 保留 y 较小的半侧.
    Supine,
    /// 俯卧 (面朝下), 从背侧进针: 保留 y 较大的半侧.
    Prone,
}

/// 抽取皮肤进针候选点.
///
/// 以 `dedup_rate` 乘包围盒对角线长为格距做网格去重 (近似等距抽稀),
/// 同时按体位只保留冠状面 `clip_y` 一侧的点. 去重保留每格第一个出现
/// 的顶点, 结果顺序与网格顶点顺序一致, 因而是确定性的.
///
/// `dedup_rate` 为 0 时不去重.
///
/// # Panics
///
/// `dedup_rate` 为负时 panic.
pub fn extract_skin(
    mesh: &SurfaceMesh,
    dedup_rate: f64,
    clip_y: f64,
    orientation: BodyOrientation,
) -> Vec<WorldPoint> {
    assert!(dedup_rate >= 0.0, "皮肤抽稀比例不能为负");
    if mesh.points().is_empty() {
        return Vec::new();
    }

    let cell = dedup_rate * mesh.bounds().diagonal().norm();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for p in mesh.points() {
        let eligible = match orientation {
            BodyOrientation::Supine => p.y <= clip_y,
            BodyOrientation::Prone => p.y >= clip_y,
        };
        if !eligible {
            continue;
        }
        if cell > 0.0 {
            let key = (
                (p.x / cell).floor() as i64,
                (p.y / cell).floor() as i64,
                (p.z / cell).floor() as i64,
            );
            if !seen.insert(key) {
                continue;
            }
        }
        out.push(*p);
    }
    out
}

/// 合并危险器官网格并抽取障碍点云.
///
/// 返回的网格用于线段求交, 点云用于最小障碍距离评分;
/// 点云按等距步长保留约 `keep` 比例的顶点.
pub fn extract_obstacle_points<'a, I>(meshes: I, keep: f64) -> (SurfaceMesh, Vec<WorldPoint>)
where
    I: IntoIterator<Item = &'a SurfaceMesh>,
{
    let merged = SurfaceMesh::merged(meshes);
    let points = merged.sample_vertices(keep);
    (merged, points)
}

/// 以各向同性的毫米步长抽取肿瘤内部采样点.
///
/// 步长按体素间距折算成各轴的整块体素数; 只有完整落在掩膜内且
/// 全部为前景的块才产出一个采样点, 点位取块起始体素的世界坐标.
/// 残缺的边缘块一律丢弃.
///
/// # Panics
///
/// `step_mm` 非正时 panic.
pub fn extract_tumor(mask_vol: &MaskVolume, step_mm: f64) -> Vec<WorldPoint> {
    assert!(step_mm > 0.0, "肿瘤采样步长必须为正");
    let [sz, sh, sw] = mask_vol.spacing();
    let fz = (step_mm / sz).round().max(1.0) as usize;
    let fh = (step_mm / sh).round().max(1.0) as usize;
    let fw = (step_mm / sw).round().max(1.0) as usize;

    let (nz, nh, nw) = mask_vol.shape();
    let data = mask_vol.data();
    let mut out = Vec::new();
    let mut z0 = 0;
    while z0 + fz <= nz {
        let mut h0 = 0;
        while h0 + fh <= nh {
            let mut w0 = 0;
            while w0 + fw <= nw {
                let block = data.slice(ndarray::s![z0..z0 + fz, h0..h0 + fh, w0..w0 + fw]);
                if block.iter().all(|&v| mask::is_foreground(v)) {
                    out.push(mask_vol.world_at((z0, h0, w0)));
                }
                w0 += fw;
            }
            h0 += fh;
        }
        z0 += fz;
    }
    out
}
