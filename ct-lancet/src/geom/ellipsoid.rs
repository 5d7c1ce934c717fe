//! 定向消融椭球.
//!
//! 椭球局部坐标系的 +X 轴即进针方向, 消融区绕该轴旋转对称,
//! 因此姿态只需一个把 +X 轴转到进针方向的最小旋转来描述,
//! 不存在滚转歧义.

use nalgebra::{Rotation3, Vector3};

use super::mesh::{Aabb, SurfaceMesh};
use crate::consts::GEOM_EPS;
use crate::{WorldPoint, WorldVec};

/// 单针消融区的几何模型: 以靶点为中心的定向椭球.
#[derive(Debug, Clone)]
pub struct AblationEllipsoid {
    center: WorldPoint,
    /// 局部 (x, y, z) 三个半轴长, 单位毫米. x 为进针方向.
    semi_axes: [f64; 3],
    /// 局部坐标系到世界坐标系的旋转.
    rotation: Rotation3<f64>,
}

impl AblationEllipsoid {
    /// 构造沿 `entry -> target` 方向对齐的椭球, 中心在 `target`.
    ///
    /// `semi_axes[0]` 是沿进针方向的半轴. 进针向量退化 (两点重合)
    /// 时椭球保持与世界坐标轴对齐.
    ///
    /// # Panics
    ///
    /// 任一半轴非正时 panic.
    pub fn aligned(entry: &WorldPoint, target: &WorldPoint, semi_axes: [f64; 3]) -> Self {
        assert!(semi_axes.iter().all(|&a| a > 0.0), "椭球半轴必须为正");
        Self {
            center: *target,
            semi_axes,
            rotation: rotation_from_x(&(target - entry)),
        }
    }

    /// 椭球中心 (即靶点).
    #[inline]
    pub fn center(&self) -> WorldPoint {
        self.center
    }

    /// 三个半轴长, 单位毫米.
    #[inline]
    pub fn semi_axes(&self) -> [f64; 3] {
        self.semi_axes
    }

    /// 局部到世界的旋转.
    #[inline]
    pub fn rotation(&self) -> &Rotation3<f64> {
        &self.rotation
    }

    /// 点 `p` 是否落在椭球内部或表面上.
    pub fn contains(&self, p: &WorldPoint) -> bool {
        let local = self.rotation.inverse_transform_vector(&(p - self.center));
        let [a, b, c] = self.semi_axes;
        (local.x / a).powi(2) + (local.y / b).powi(2) + (local.z / c).powi(2) <= 1.0
    }

    /// 世界坐标系下的包围盒.
    pub fn bounds(&self) -> Aabb {
        // 旋转椭球沿世界轴 i 的半跨度为 sqrt(Σ_j (R_ij * a_j)^2).
        let m = self.rotation.matrix();
        let mut half = [0.0_f64; 3];
        for (i, h) in half.iter_mut().enumerate() {
            *h = (0..3)
                .map(|j| (m[(i, j)] * self.semi_axes[j]).powi(2))
                .sum::<f64>()
                .sqrt();
        }
        let h = WorldVec::new(half[0], half[1], half[2]);
        Aabb {
            min: self.center - h,
            max: self.center + h,
        }
    }

    /// 生成 UV 球式的椭球表面网格, 供可视化层使用.
    ///
    /// `stacks` 为沿进针方向的纬向细分数 (`>= 2`),
    /// `slices` 为绕进针方向的经向细分数 (`>= 3`).
    pub fn surface_mesh(&self, stacks: usize, slices: usize) -> SurfaceMesh {
        assert!(stacks >= 2 && slices >= 3, "椭球网格细分数过低");
        let [a, b, c] = self.semi_axes;
        let to_world = |phi: f64, theta: f64| -> WorldPoint {
            let local = WorldVec::new(
                a * phi.cos(),
                b * phi.sin() * theta.cos(),
                c * phi.sin() * theta.sin(),
            );
            self.center + self.rotation * local
        };

        // 两极各一个顶点, 中间 stacks-1 圈每圈 slices 个.
        let mut points = Vec::with_capacity(2 + (stacks - 1) * slices);
        points.push(to_world(0.0, 0.0));
        for r in 1..stacks {
            let phi = std::f64::consts::PI * r as f64 / stacks as f64;
            for s in 0..slices {
                let theta = std::f64::consts::TAU * s as f64 / slices as f64;
                points.push(to_world(phi, theta));
            }
        }
        points.push(to_world(std::f64::consts::PI, 0.0));

        let ring = |r: usize, s: usize| (1 + (r - 1) * slices + s % slices) as u32;
        let mut triangles = Vec::with_capacity(2 * slices * (stacks - 1));
        for s in 0..slices {
            triangles.push([0, ring(1, s), ring(1, s + 1)]);
        }
        for r in 1..stacks - 1 {
            for s in 0..slices {
                let (i0, i1) = (ring(r, s), ring(r, s + 1));
                let (j0, j1) = (ring(r + 1, s), ring(r + 1, s + 1));
                triangles.push([i0, j0, j1]);
                triangles.push([i0, j1, i1]);
            }
        }
        let south = (1 + (stacks - 1) * slices) as u32;
        for s in 0..slices {
            triangles.push([south, ring(stacks - 1, s + 1), ring(stacks - 1, s)]);
        }

        SurfaceMesh::new(points, triangles)
    }
}

/// +X 轴到 `dir` 的最小旋转.
///
/// `dir` 与 +X 反向平行时最小旋转不唯一, 取绕 +Y 的半周旋转;
/// `dir` 为零向量时返回恒等旋转.
fn rotation_from_x(dir: &WorldVec) -> Rotation3<f64> {
    if dir.norm_squared() < GEOM_EPS {
        return Rotation3::identity();
    }
    Rotation3::rotation_between(&Vector3::x(), dir).unwrap_or_else(|| {
        Rotation3::from_axis_angle(&Vector3::y_axis(), std::f64::consts::PI)
    })
}
