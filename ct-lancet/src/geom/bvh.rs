//! 三角网格的包围盒层次结构 (BVH) 与线段求交.
//!
//! 针对 "一次构建, 成千上万次线段查询" 的访问模式: 构建时把三角形
//! 重排进叶子节点, 查询时只做 AABB 剪枝加 Möller-Trumbore 精确求交.

use super::mesh::{Aabb, SurfaceMesh};
use crate::consts::GEOM_EPS;
use crate::WorldPoint;

/// 叶子节点最多容纳的三角形数.
const LEAF_SIZE: usize = 8;

/// BVH 内部节点.
///
/// 节点按先序紧凑存储, 左孩子恒为 `id + 1`, 因此只需记录右孩子.
#[derive(Debug, Clone)]
struct Node {
    aabb: Aabb,
    /// 叶子: 三角形区间起点; 内部节点: 右孩子下标.
    first: u32,
    /// 叶子: 区间长度; 内部节点: 0.
    count: u32,
}

impl Node {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// 三角网格的线段求交加速结构.
///
/// 构建时复制并重排网格三角形, 之后的查询不再依赖原网格.
#[derive(Debug, Clone)]
pub struct MeshBvh {
    tris: Vec<[WorldPoint; 3]>,
    nodes: Vec<Node>,
}

impl MeshBvh {
    /// 为 `mesh` 构建 BVH. 空网格产生一个永不命中的空结构.
    pub fn build(mesh: &SurfaceMesh) -> Self {
        let mut tris: Vec<[WorldPoint; 3]> =
            (0..mesh.triangles().len()).map(|i| mesh.triangle(i)).collect();

        let mut bvh = Self {
            nodes: Vec::new(),
            tris: Vec::new(),
        };
        if tris.is_empty() {
            return bvh;
        }

        let n = tris.len();
        bvh.nodes.reserve(2 * n);
        bvh.split(&mut tris, 0, n);
        bvh.tris = tris;
        bvh
    }

    /// 递归划分 `tris[lo..hi]`, 返回新建节点的下标.
    fn split(&mut self, tris: &mut [[WorldPoint; 3]], lo: usize, hi: usize) -> u32 {
        let mut aabb = Aabb::empty();
        for t in &tris[lo..hi] {
            for p in t {
                aabb.grow(p);
            }
        }

        let id = self.nodes.len() as u32;
        self.nodes.push(Node {
            aabb,
            first: lo as u32,
            count: (hi - lo) as u32,
        });

        if hi - lo <= LEAF_SIZE {
            return id;
        }

        // 沿质心跨度最大的轴做中位数划分.
        let axis = {
            let mut c = Aabb::empty();
            for t in &tris[lo..hi] {
                c.grow(&centroid(t));
            }
            c.longest_axis()
        };
        let mid = lo + (hi - lo) / 2;
        tris[lo..hi].select_nth_unstable_by(mid - lo, |a, b| {
            centroid(a)[axis].total_cmp(&centroid(b)[axis])
        });

        let _left = self.split(tris, lo, mid);
        let right = self.split(tris, mid, hi);
        self.nodes[id as usize].first = right;
        self.nodes[id as usize].count = 0;
        id
    }

    /// 线段 `a`-`b` 是否与网格有交点.
    pub fn segment_hits(&self, a: &WorldPoint, b: &WorldPoint) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let mut stack = vec![0_u32];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if !node.aabb.segment_hits(a, b) {
                continue;
            }
            if node.is_leaf() {
                let lo = node.first as usize;
                let hi = lo + node.count as usize;
                if self.tris[lo..hi]
                    .iter()
                    .any(|t| segment_triangle(a, b, t).is_some())
                {
                    return true;
                }
            } else {
                stack.push(id + 1);
                stack.push(node.first);
            }
        }
        false
    }

    /// 沿 `a` 到 `b` 方向最近的交点.
    ///
    /// 无交点时返回 `None`.
    pub fn first_hit(&self, a: &WorldPoint, b: &WorldPoint) -> Option<WorldPoint> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<f64> = None;
        let mut stack = vec![0_u32];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id as usize];
            if !node.aabb.segment_hits(a, b) {
                continue;
            }
            if node.is_leaf() {
                let lo = node.first as usize;
                let hi = lo + node.count as usize;
                for t in &self.tris[lo..hi] {
                    if let Some(t_hit) = segment_triangle(a, b, t) {
                        if best.map_or(true, |cur| t_hit < cur) {
                            best = Some(t_hit);
                        }
                    }
                }
            } else {
                stack.push(id + 1);
                stack.push(node.first);
            }
        }
        best.map(|t| a + (b - a) * t)
    }
}

#[inline]
fn centroid(t: &[WorldPoint; 3]) -> WorldPoint {
    WorldPoint::new(
        (t[0].x + t[1].x + t[2].x) / 3.0,
        (t[0].y + t[1].y + t[2].y) / 3.0,
        (t[0].z + t[1].z + t[2].z) / 3.0,
    )
}

/// Möller-Trumbore 线段-三角形求交.
///
/// 返回交点在 `a -> b` 上的参数 `t` (`0 <= t <= 1`). 与三角形平面近似平行
/// (含相切擦过) 的线段按未命中处理, 由 [`GEOM_EPS`] 控制.
fn segment_triangle(a: &WorldPoint, b: &WorldPoint, tri: &[WorldPoint; 3]) -> Option<f64> {
    let dir = b - a;
    let e1 = tri[1] - tri[0];
    let e2 = tri[2] - tri[0];

    let pvec = dir.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < GEOM_EPS {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = a - tri[0];
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&e1);
    let v = dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&qvec) * inv_det;
    (0.0..=1.0).contains(&t).then_some(t)
}
