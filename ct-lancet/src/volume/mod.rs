//! 二值体素掩膜与网格规格.
//!
//! 掩膜数据一律按 `(z, h, w)` 顺序访问, 与世界坐标的换算为
//! `w -> x`, `h -> y`, `z -> z` (见 [`GridSpec::world_at`]).

use std::ops::{Index, IndexMut};

use ndarray::{Array3, Zip};

use crate::consts::mask;
use crate::{Idx3d, WorldPoint};

mod morph;
mod stencil;

pub use morph::dilate_ball_mm;
pub use stencil::rasterize;

/// 体素网格规格: 形状, 间距与原点.
///
/// 两个掩膜只有在规格一致时才允许做体素级布尔运算.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridSpec {
    /// 形状, `(z, h, w)` 顺序.
    pub shape: Idx3d,
    /// 体素间距, `[z, h, w]` 顺序, 单位毫米.
    pub spacing: [f64; 3],
    /// 体素 `(0, 0, 0)` 的世界坐标.
    pub origin: WorldPoint,
}

impl GridSpec {
    /// 间距/原点比较容差, 单位毫米. 来自上游重采样的舍入误差远小于该值.
    const TOL: f64 = 1e-6;

    /// 两个规格是否一致: 形状精确相等, 间距与原点在容差内相等.
    pub fn matches(&self, other: &GridSpec) -> bool {
        self.shape == other.shape
            && self
                .spacing
                .iter()
                .zip(other.spacing.iter())
                .all(|(a, b)| (a - b).abs() < Self::TOL)
            && (self.origin - other.origin).amax() < Self::TOL
    }

    /// 体素索引对应的世界坐标.
    #[inline]
    pub fn world_at(&self, (z, h, w): Idx3d) -> WorldPoint {
        WorldPoint::new(
            self.origin.x + w as f64 * self.spacing[2],
            self.origin.y + h as f64 * self.spacing[1],
            self.origin.z + z as f64 * self.spacing[0],
        )
    }

    /// 总体素数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, h, w) = self.shape;
        z * h * w
    }
}

/// 二值体素掩膜.
///
/// 由外部分割/重采样流程产出 (或由 [`rasterize`] 生成),
/// 体素值只区分背景与前景, 见 [`crate::consts::mask`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaskVolume {
    data: Array3<u8>,
    spacing: [f64; 3],
    origin: WorldPoint,
}

impl MaskVolume {
    /// 由体素数组与空间信息构造掩膜.
    ///
    /// # Panics
    ///
    /// 任一方向间距非正时 panic.
    pub fn new(data: Array3<u8>, spacing: [f64; 3], origin: WorldPoint) -> Self {
        assert!(spacing.iter().all(|&s| s > 0.0), "体素间距必须为正");
        Self {
            data,
            spacing,
            origin,
        }
    }

    /// 全背景掩膜.
    pub fn zeros(shape: Idx3d, spacing: [f64; 3], origin: WorldPoint) -> Self {
        Self::new(
            Array3::from_elem(shape, mask::BACKGROUND),
            spacing,
            origin,
        )
    }

    /// 与给定规格同网格的全背景掩膜.
    pub fn empty_like(spec: &GridSpec) -> Self {
        Self::zeros(spec.shape, spec.spacing, spec.origin)
    }

    /// 体素数据.
    #[inline]
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    /// 可变体素数据. 仅限 crate 内部的形态学/栅格化流程使用.
    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }

    /// 形状, `(z, h, w)` 顺序.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 体素间距, `[z, h, w]` 顺序, 单位毫米.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 体素 `(0, 0, 0)` 的世界坐标.
    #[inline]
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// 掩膜的网格规格.
    #[inline]
    pub fn spec(&self) -> GridSpec {
        GridSpec {
            shape: self.shape(),
            spacing: self.spacing,
            origin: self.origin,
        }
    }

    /// 体素索引对应的世界坐标.
    #[inline]
    pub fn world_at(&self, idx: Idx3d) -> WorldPoint {
        self.spec().world_at(idx)
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 前景体素个数.
    pub fn foreground_count(&self) -> usize {
        self.data
            .iter()
            .filter(|&&v| mask::is_foreground(v))
            .count()
    }

    /// 与另一掩膜前景交集的体素个数.
    ///
    /// # Panics
    ///
    /// 两掩膜网格规格不一致时 panic.
    pub fn intersect_count(&self, other: &MaskVolume) -> usize {
        assert!(
            self.spec().matches(&other.spec()),
            "体素布尔运算要求两掩膜网格规格一致"
        );
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|&(&a, &b)| mask::is_foreground(a) && mask::is_foreground(b))
            .count()
    }

    /// 把另一掩膜的前景并入本掩膜 (体素级逻辑或).
    ///
    /// # Panics
    ///
    /// 两掩膜网格规格不一致时 panic.
    pub fn union_with(&mut self, other: &MaskVolume) {
        assert!(
            self.spec().matches(&other.spec()),
            "体素布尔运算要求两掩膜网格规格一致"
        );
        Zip::from(&mut self.data)
            .and(&other.data)
            .for_each(|a, &b| {
                if mask::is_foreground(b) {
                    *a = mask::FOREGROUND;
                }
            });
    }
}

impl Index<Idx3d> for MaskVolume {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for MaskVolume {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::Axis;
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl MaskVolume {
    /// 借助 `rayon`, 按水平切片并行统计前景体素个数.
    pub fn par_foreground_count(&self) -> usize {
        self.data
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|s| s.iter().filter(|&&v| mask::is_foreground(v)).count())
            .sum()
    }

    /// 借助 `rayon`, 按水平切片并行统计两掩膜前景交集体素数.
    ///
    /// # Panics
    ///
    /// 两掩膜网格规格不一致时 panic.
    pub fn par_intersect_count(&self, other: &MaskVolume) -> usize {
        assert!(
            self.spec().matches(&other.spec()),
            "体素布尔运算要求两掩膜网格规格一致"
        );
        self.data
            .axis_iter(Axis(0))
            .into_par_iter()
            .zip(other.data.axis_iter(Axis(0)).into_par_iter())
            .map(|(a, b)| {
                a.iter()
                    .zip(b.iter())
                    .filter(|&(&x, &y)| mask::is_foreground(x) && mask::is_foreground(y))
                    .count()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn brick() -> MaskVolume {
        let mut m = MaskVolume::zeros((4, 4, 4), [1.0, 1.0, 1.0], Point3::origin());
        for z in 1..3 {
            for h in 0..2 {
                for w in 0..4 {
                    m[(z, h, w)] = mask::FOREGROUND;
                }
            }
        }
        m
    }

    #[test]
    fn test_world_at_mapping() {
        let spec = GridSpec {
            shape: (4, 4, 4),
            spacing: [2.0, 1.0, 0.5],
            origin: Point3::new(10.0, 20.0, 30.0),
        };
        // w 方向走 x, z 方向走 z.
        assert_eq!(spec.world_at((1, 2, 3)), Point3::new(11.5, 22.0, 32.0));
        assert_eq!(spec.size(), 64);
    }

    #[test]
    fn test_spec_matches_tolerance() {
        let m = brick();
        let mut spec = m.spec();
        assert!(spec.matches(&m.spec()));

        spec.origin.x += 1e-8;
        assert!(spec.matches(&m.spec()));

        spec.origin.x += 1.0;
        assert!(!spec.matches(&m.spec()));

        let mut other = m.spec();
        other.shape = (4, 4, 5);
        assert!(!other.matches(&m.spec()));
    }

    #[test]
    fn test_boolean_counts() {
        let a = brick();
        assert!(a.check(&(3, 3, 3)) && !a.check(&(4, 0, 0)));
        assert_eq!(a.foreground_count(), 2 * 2 * 4);

        let mut b = MaskVolume::empty_like(&a.spec());
        for w in 0..4 {
            b[(1, 0, w)] = mask::FOREGROUND;
            b[(3, 3, w)] = mask::FOREGROUND;
        }
        assert_eq!(a.intersect_count(&b), 4);

        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.foreground_count(), 16 + 4);
    }

    #[test]
    #[should_panic(expected = "网格规格一致")]
    fn test_boolean_rejects_mismatched_grids() {
        let a = brick();
        let b = MaskVolume::zeros((4, 4, 4), [1.0, 1.0, 2.0], Point3::origin());
        let _ = a.intersect_count(&b);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_counts_agree_with_sequential() {
        let a = brick();
        let mut b = MaskVolume::empty_like(&a.spec());
        b[(2, 1, 1)] = mask::FOREGROUND;
        b[(0, 0, 0)] = mask::FOREGROUND;

        assert_eq!(a.par_foreground_count(), a.foreground_count());
        assert_eq!(a.par_intersect_count(&b), a.intersect_count(&b));
    }
}
