//! 肿瘤靶点聚类.
//!
//! 每个簇对应一根消融针: 簇质心是针的靶点, 簇半径决定消融区尺寸.
//! 自动模式从 k = 1 起搜索, 直到每个簇的半径都落入最大消融半径;
//! 大肿瘤固定针数模式则跳过搜索, 按调用方给定的针数一次划分.

mod kmeans;

use log::debug;
use rand::rngs::StdRng;

use crate::plan::error::{PlanError, PlanResult};
use crate::WorldPoint;
use kmeans::kmeans;

/// 一个靶点簇.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetCluster {
    /// 簇质心, 即针的靶点.
    pub center: WorldPoint,
    /// 质心到簇内最远成员点的距离, 单位毫米.
    pub radius: f64,
    /// 簇内成员点.
    pub members: Vec<WorldPoint>,
}

/// 自动搜索针数的聚类.
///
/// 从 k = 1 开始反复整体重聚类, 直到每个簇的半径都不超过
/// `max_radius`. k 增长到点数仍不满足是不可能的 (此时每簇半径为 0),
/// 因此搜索必然终止; 点数不足以支撑当前 k 时返回
/// [`PlanError::InsufficientSamples`].
///
/// # Panics
///
/// `max_radius` 非正时 panic.
pub fn cluster(
    points: &[WorldPoint],
    max_radius: f64,
    rng: &mut StdRng,
) -> PlanResult<Vec<TargetCluster>> {
    assert!(max_radius > 0.0, "最大消融半径必须为正");
    if points.is_empty() {
        return Err(PlanError::InsufficientSamples { have: 0, need: 1 });
    }

    let mut k = 1;
    loop {
        if k > points.len() {
            return Err(PlanError::InsufficientSamples {
                have: points.len(),
                need: k,
            });
        }

        let (centers, assignment) = kmeans(points, k, rng);
        let clusters = build_clusters(points, centers, &assignment);
        if clusters.iter().all(|c| c.radius <= max_radius) {
            debug!(
                "聚类收敛: k = {}, 最大簇半径 = {:.2}mm",
                k,
                clusters.iter().map(|c| c.radius).fold(0.0, f64::max)
            );
            return Ok(clusters);
        }
        k += 1;
    }
}

/// 固定针数的聚类 (大肿瘤模式).
///
/// 只做一次 k 均值划分, 不检查半径约束; 半径到消融半径的收缩
/// 换算由规划流程完成.
pub fn cluster_fixed(
    points: &[WorldPoint],
    k: usize,
    rng: &mut StdRng,
) -> PlanResult<Vec<TargetCluster>> {
    assert!(k >= 1, "固定针数必须至少为 1");
    if points.len() < k {
        return Err(PlanError::InsufficientSamples {
            have: points.len(),
            need: k,
        });
    }

    let (centers, assignment) = kmeans(points, k, rng);
    Ok(build_clusters(points, centers, &assignment))
}

/// 由质心与分配结果组装簇, 并计算各簇半径.
fn build_clusters(
    points: &[WorldPoint],
    centers: Vec<WorldPoint>,
    assignment: &[usize],
) -> Vec<TargetCluster> {
    let mut members = vec![Vec::new(); centers.len()];
    for (p, &c) in points.iter().zip(assignment.iter()) {
        members[c].push(*p);
    }

    centers
        .into_iter()
        .zip(members)
        .map(|(center, members)| {
            let radius = members
                .iter()
                .map(|p| nalgebra::distance(p, &center))
                .fold(0.0, f64::max);
            TargetCluster {
                center,
                radius,
                members,
            }
        })
        .collect()
}
