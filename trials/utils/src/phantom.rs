//! 合成胸腔假体.
//!
//! 用解析几何拼一副可规划的"病人": 球面网格与圆管网格充当器官表面,
//! 球形掩膜充当肿瘤. 没有真实分割数据时也能跑通整条流水线.

use ct_lancet::prelude::*;

/// 以 `center` 为球心, `r` 为半径的封闭球面网格.
pub fn ball_mesh(center: WorldPoint, r: f64) -> SurfaceMesh {
    let entry = WorldPoint::new(center.x - 1.0, center.y, center.z);
    AblationEllipsoid::aligned(&entry, &center, [r, r, r]).surface_mesh(24, 24)
}

/// 两端开口的圆管网格, 充当气道或血管.
///
/// # Panics
///
/// 半径非正, 侧面数小于 3, 或两端重合时 panic.
pub fn tube_mesh(start: WorldPoint, end: WorldPoint, r: f64, segments: usize) -> SurfaceMesh {
    assert!(r > 0.0, "圆管半径必须为正");
    assert!(segments >= 3, "圆管至少需要 3 个侧面");
    let axis = end - start;
    let norm = axis.norm();
    assert!(norm > 0.0, "圆管两端不能重合");
    let axis = axis / norm;

    // 取与轴最不平行的坐标轴做参考, 搭出横截面的正交基.
    let helper = if axis.x.abs() < 0.9 {
        WorldVec::x()
    } else {
        WorldVec::y()
    };
    let u = axis.cross(&helper).normalize();
    let v = axis.cross(&u);

    let mut points = Vec::with_capacity(segments * 2);
    for ring in [start, end] {
        for i in 0..segments {
            let a = std::f64::consts::TAU * i as f64 / segments as f64;
            points.push(ring + (u * a.cos() + v * a.sin()) * r);
        }
    }
    let mut triangles = Vec::with_capacity(segments * 2);
    for i in 0..segments {
        let j = (i + 1) % segments;
        let (a, b) = (i as u32, j as u32);
        let (c, d) = (a + segments as u32, b + segments as u32);
        triangles.push([a, b, c]);
        triangles.push([b, d, c]);
    }
    SurfaceMesh::new(points, triangles)
}

/// 以 `center` 为球心, `r` 为半径的球形前景掩膜.
pub fn ball_mask(spec: &GridSpec, center: WorldPoint, r: f64) -> MaskVolume {
    let mut mask = MaskVolume::empty_like(spec);
    let (nz, nh, nw) = mask.shape();
    for z in 0..nz {
        for h in 0..nh {
            for w in 0..nw {
                if (mask.world_at((z, h, w)) - center).norm() <= r {
                    mask[(z, h, w)] = FOREGROUND;
                }
            }
        }
    }
    mask
}

/// 试验假体共用的体素网格: 40^3 体素, 2mm 各向同性.
pub fn grid() -> GridSpec {
    GridSpec {
        shape: (40, 40, 40),
        spacing: [2.0; 3],
        origin: WorldPoint::new(-40.0, -40.0, -40.0),
    }
}

/// 标准合成胸腔.
///
/// 原点处 10mm 肿瘤, 同心的肺球与皮肤球; 气道, 血管, 骨骼全部
/// 摆在 `y > 0` 半空间, 仰卧位的进针路径不会与它们相交.
pub fn thorax() -> PlanInput {
    let o = WorldPoint::origin();
    PlanInput {
        tumor: ball_mask(&grid(), o, 10.0),
        lung: ball_mesh(o, 60.0),
        skin: ball_mesh(o, 150.0),
        airway: tube_mesh(
            WorldPoint::new(0.0, 50.0, -40.0),
            WorldPoint::new(0.0, 50.0, 40.0),
            8.0,
            16,
        ),
        vessels: tube_mesh(
            WorldPoint::new(25.0, 45.0, -30.0),
            WorldPoint::new(25.0, 45.0, 30.0),
            5.0,
            16,
        ),
        skeleton: ball_mesh(WorldPoint::new(-40.0, 60.0, 0.0), 10.0),
    }
}

/// 把靶区整个关进障碍球壳的对照假体: 任何进针路径都会撞上障碍.
pub fn caged_thorax() -> PlanInput {
    let shell = ball_mesh(WorldPoint::origin(), 20.0);
    PlanInput {
        airway: shell.clone(),
        vessels: shell.clone(),
        skeleton: shell,
        ..thorax()
    }
}
