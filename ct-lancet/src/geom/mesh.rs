//! 三角网格表面与轴对齐包围盒.

use crate::consts::GEOM_EPS;
use crate::{WorldPoint, WorldVec};

/// 轴对齐包围盒 (AABB), 单位毫米.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// 各维最小角点.
    pub min: WorldPoint,
    /// 各维最大角点.
    pub max: WorldPoint,
}

impl Aabb {
    /// 空包围盒. 任何 `grow` 之前不包含任何点.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: WorldPoint::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: WorldPoint::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// 由点集构造的最小包围盒.
    pub fn from_points<'a, I: IntoIterator<Item = &'a WorldPoint>>(points: I) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.grow(p);
        }
        aabb
    }

    /// 是否尚未包含任何点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// 扩张包围盒使其包含点 `p`.
    #[inline]
    pub fn grow(&mut self, p: &WorldPoint) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// 扩张包围盒使其包含另一个包围盒.
    #[inline]
    pub fn grow_aabb(&mut self, other: &Aabb) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// 包围盒中心.
    #[inline]
    pub fn center(&self) -> WorldPoint {
        nalgebra::center(&self.min, &self.max)
    }

    /// 对角线向量.
    #[inline]
    pub fn diagonal(&self) -> WorldVec {
        self.max - self.min
    }

    /// 跨度最大的维度编号 (0 = x, 1 = y, 2 = z).
    pub fn longest_axis(&self) -> usize {
        let d = self.diagonal();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// 线段 `a`-`b` 是否与包围盒相交 (slab 法).
    ///
    /// 线段端点落在盒内也算相交.
    pub fn segment_hits(&self, a: &WorldPoint, b: &WorldPoint) -> bool {
        let d = b - a;
        let mut t_min = 0.0_f64;
        let mut t_max = 1.0_f64;

        for i in 0..3 {
            if d[i].abs() < GEOM_EPS {
                // 与该维平行: 起点不在 slab 内则必不相交.
                if a[i] < self.min[i] || a[i] > self.max[i] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d[i];
            let mut t0 = (self.min[i] - a[i]) * inv;
            let mut t1 = (self.max[i] - a[i]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// 三角网格表面.
///
/// 顶点处在世界坐标系 (毫米) 下, 三角形以顶点下标的形式存储.
/// 该结构由外部分割/等值面流程产出, 本 crate 只读取不修改.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceMesh {
    points: Vec<WorldPoint>,
    triangles: Vec<[u32; 3]>,
}

impl SurfaceMesh {
    /// 由顶点与三角形下标构造网格.
    ///
    /// # Panics
    ///
    /// 任一三角形引用了越界顶点时 panic.
    pub fn new(points: Vec<WorldPoint>, triangles: Vec<[u32; 3]>) -> Self {
        let n = points.len() as u32;
        assert!(
            triangles.iter().flatten().all(|&i| i < n),
            "三角形顶点下标越界"
        );
        Self { points, triangles }
    }

    /// 全部顶点.
    #[inline]
    pub fn points(&self) -> &[WorldPoint] {
        &self.points
    }

    /// 全部三角形 (顶点下标形式).
    #[inline]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// 按下标取出三角形的三个顶点坐标.
    #[inline]
    pub fn triangle(&self, i: usize) -> [WorldPoint; 3] {
        let [a, b, c] = self.triangles[i];
        [
            self.points[a as usize],
            self.points[b as usize],
            self.points[c as usize],
        ]
    }

    /// 网格是否为空 (无三角形).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// 顶点包围盒.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.points.iter())
    }

    /// 合并多个网格为一个, 顶点下标整体偏移.
    pub fn merged<'a, I: IntoIterator<Item = &'a SurfaceMesh>>(meshes: I) -> Self {
        let mut points = Vec::new();
        let mut triangles = Vec::new();
        for m in meshes {
            let offset = points.len() as u32;
            points.extend_from_slice(&m.points);
            triangles.extend(m.triangles.iter().map(|t| t.map(|i| i + offset)));
        }
        Self { points, triangles }
    }

    /// 以等距步长抽取约 `keep` 比例的顶点.
    ///
    /// `keep >= 1` 时返回全部顶点. 抽取结果保持原始顶点顺序, 因而是确定性的.
    pub fn sample_vertices(&self, keep: f64) -> Vec<WorldPoint> {
        assert!(keep > 0.0, "顶点保留比例必须为正");
        if keep >= 1.0 {
            return self.points.clone();
        }
        let stride = (1.0 / keep).round().max(1.0) as usize;
        self.points.iter().step_by(stride).copied().collect()
    }
}
