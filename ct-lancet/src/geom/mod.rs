//! 世界坐标系下的几何原语.
//!
//! 体素索引按照 `(z, h, w)` 图像顺序组织 (见 [`crate::volume`]),
//! 本模块则统一使用 `nalgebra` 的 `(x, y, z)` 世界坐标, 单位毫米.
//! 两者的换算关系: `w -> x`, `h -> y`, `z -> z`.

mod bvh;
mod ellipsoid;
mod mesh;

pub use bvh::MeshBvh;
pub use ellipsoid::AblationEllipsoid;
pub use mesh::{Aabb, SurfaceMesh};

use crate::consts::GEOM_EPS;
use crate::WorldPoint;

/// 点 `p` 到线段 `a`-`b` 的欧氏距离.
///
/// 线段退化为一点时返回点间距离.
pub fn segment_distance(p: &WorldPoint, a: &WorldPoint, b: &WorldPoint) -> f64 {
    let d = b - a;
    let len2 = d.norm_squared();
    if len2 < GEOM_EPS {
        return (p - a).norm();
    }

    // 垂足参数限制在线段内部.
    let t = ((p - a).dot(&d) / len2).clamp(0.0, 1.0);
    (a + d * t - p).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    #[test]
    fn test_segment_distance_interior() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(10.0, 0.0, 0.0);
        let p = Point3::new(5.0, 3.0, 0.0);
        assert!(f64_eq(segment_distance(&p, &a, &b), 3.0));
    }

    #[test]
    fn test_segment_distance_clamps_to_endpoints() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(10.0, 0.0, 0.0);

        // 垂足在线段外, 距离应取到端点.
        let before = Point3::new(-4.0, 3.0, 0.0);
        assert!(f64_eq(segment_distance(&before, &a, &b), 5.0));

        let after = Point3::new(13.0, 4.0, 0.0);
        assert!(f64_eq(segment_distance(&after, &a, &b), 5.0));
    }

    #[test]
    fn test_segment_distance_degenerate_segment() {
        let a = Point3::new(1.0, 1.0, 1.0);
        let p = Point3::new(1.0, 5.0, 1.0);
        assert!(f64_eq(segment_distance(&p, &a, &a), 4.0));
    }
}
