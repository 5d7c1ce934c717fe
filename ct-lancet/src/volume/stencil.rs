//! 把解析椭球栅格化到掩膜网格.

use ndarray::ArrayViewMut2;

use super::{GridSpec, MaskVolume};
use crate::consts::mask;
use crate::geom::{Aabb, AblationEllipsoid};

/// 在 `spec` 描述的网格上栅格化椭球, 返回消融区掩膜.
///
/// 逐体素做解析内点测试, 迭代范围收窄到椭球包围盒与网格的交叠窗口;
/// 椭球越出网格的部分被自然裁剪. 启用 `rayon` 特性时按水平切片并行,
/// 每个体素的判定与次序无关, 结果与串行路径完全一致.
pub fn rasterize(ell: &AblationEllipsoid, spec: &GridSpec) -> MaskVolume {
    let mut out = MaskVolume::empty_like(spec);
    let Some(win) = index_window(&ell.bounds(), spec) else {
        return out;
    };

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            use ndarray::Axis;
            use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

            out.data_mut()
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(z, slice)| fill_slice(ell, spec, &win, z, slice));
        } else {
            use ndarray::Axis;

            for (z, slice) in out.data_mut().axis_iter_mut(Axis(0)).enumerate() {
                fill_slice(ell, spec, &win, z, slice);
            }
        }
    }
    out
}

/// 填充单张水平切片中窗口内的椭球体素.
fn fill_slice(
    ell: &AblationEllipsoid,
    spec: &GridSpec,
    win: &[(usize, usize); 3],
    z: usize,
    mut slice: ArrayViewMut2<u8>,
) {
    let [(z0, z1), (h0, h1), (w0, w1)] = *win;
    if z < z0 || z > z1 {
        return;
    }
    for h in h0..=h1 {
        for w in w0..=w1 {
            if ell.contains(&spec.world_at((z, h, w))) {
                slice[(h, w)] = mask::FOREGROUND;
            }
        }
    }
}

/// 世界包围盒与网格交叠的体素索引窗口, 各维闭区间.
///
/// 完全不相交时返回 `None`.
fn index_window(aabb: &Aabb, spec: &GridSpec) -> Option<[(usize, usize); 3]> {
    let (nz, nh, nw) = spec.shape;
    let dims = [nz, nh, nw];
    // 轴序换算: 世界 (x, y, z) 对应索引 (w, h, z).
    let lo = [
        (aabb.min.z - spec.origin.z) / spec.spacing[0],
        (aabb.min.y - spec.origin.y) / spec.spacing[1],
        (aabb.min.x - spec.origin.x) / spec.spacing[2],
    ];
    let hi = [
        (aabb.max.z - spec.origin.z) / spec.spacing[0],
        (aabb.max.y - spec.origin.y) / spec.spacing[1],
        (aabb.max.x - spec.origin.x) / spec.spacing[2],
    ];

    let mut win = [(0_usize, 0_usize); 3];
    for i in 0..3 {
        if dims[i] == 0 || hi[i] < 0.0 {
            return None;
        }
        let l = lo[i].ceil().max(0.0) as usize;
        let h = (hi[i].floor() as usize).min(dims[i] - 1);
        if l > h {
            return None;
        }
        win[i] = (l, h);
    }
    Some(win)
}
