//! 掩膜的三维二值形态学操作.

use super::MaskVolume;
use crate::consts::mask;

/// 以毫米半径的球形结构元对掩膜做二值膨胀, 返回新掩膜.
///
/// 结构元半径按各向异性体素间距折算, 因此在非等距网格上
/// 结构元是体素单位下的椭球. 膨胀仅从前景边界体素出发盖章:
/// 掩膜外任一点的最近前景体素必是边界体素, 结果与逐前景体素
/// 盖章一致. `radius_mm <= 0` 时退化为拷贝.
pub fn dilate_ball_mm(mask_vol: &MaskVolume, radius_mm: f64) -> MaskVolume {
    let mut out = mask_vol.clone();
    if radius_mm <= 0.0 {
        return out;
    }

    let offsets = ball_offsets(mask_vol.spacing(), radius_mm);
    let (nz, nh, nw) = mask_vol.shape();

    let is_bg = |z: usize, h: usize, w: usize| mask::is_background(mask_vol[(z, h, w)]);
    // 6-邻域中含背景或紧贴体积边缘的前景体素即边界体素.
    let on_boundary = |z: usize, h: usize, w: usize| {
        z == 0
            || z + 1 == nz
            || h == 0
            || h + 1 == nh
            || w == 0
            || w + 1 == nw
            || is_bg(z - 1, h, w)
            || is_bg(z + 1, h, w)
            || is_bg(z, h - 1, w)
            || is_bg(z, h + 1, w)
            || is_bg(z, h, w - 1)
            || is_bg(z, h, w + 1)
    };

    for ((z, h, w), &v) in mask_vol.data().indexed_iter() {
        if !mask::is_foreground(v) || !on_boundary(z, h, w) {
            continue;
        }
        for &(dz, dh, dw) in &offsets {
            let zi = z as i64 + dz;
            let hi = h as i64 + dh;
            let wi = w as i64 + dw;
            if zi < 0 || hi < 0 || wi < 0 {
                continue;
            }
            let (zi, hi, wi) = (zi as usize, hi as usize, wi as usize);
            if zi < nz && hi < nh && wi < nw {
                out[(zi, hi, wi)] = mask::FOREGROUND;
            }
        }
    }
    out
}

/// 以体素为单位枚举球形结构元覆盖的整数偏移.
fn ball_offsets(spacing: [f64; 3], radius_mm: f64) -> Vec<(i64, i64, i64)> {
    let [sz, sh, sw] = spacing;
    let r2 = radius_mm * radius_mm;
    let (rz, rh, rw) = (
        (radius_mm / sz) as i64,
        (radius_mm / sh) as i64,
        (radius_mm / sw) as i64,
    );

    let mut out = Vec::new();
    for dz in -rz..=rz {
        for dh in -rh..=rh {
            for dw in -rw..=rw {
                let d2 = (dz as f64 * sz).powi(2)
                    + (dh as f64 * sh).powi(2)
                    + (dw as f64 * sw).powi(2);
                if d2 <= r2 {
                    out.push((dz, dh, dw));
                }
            }
        }
    }
    out
}
