//! 进针路径的硬约束过滤: 深度上限与视线障碍规避.

use log::{debug, warn};

use super::error::{PlanError, PlanResult};
use crate::consts::plan::MIN_DEPTH_CANDIDATES;
use crate::geom::MeshBvh;
use crate::WorldPoint;

/// 一个尚未被淘汰的进针候选.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// 皮肤上的进针点.
    pub entry: WorldPoint,
    /// 进针点到靶点的距离 (进针深度), 单位毫米.
    pub depth: f64,
}

/// 深度过滤: 保留到靶点距离不超过 `max_depth` 的皮肤点.
///
/// 幸存数低于 [`MIN_DEPTH_CANDIDATES`] 即判定失败: 如此少的候选
/// 几乎只会由体位标志或深度上限配置错误造成.
///
/// # Panics
///
/// `max_depth` 非正时 panic.
pub fn filter_by_depth(
    skin: &[WorldPoint],
    target: &WorldPoint,
    max_depth: f64,
) -> PlanResult<Vec<Candidate>> {
    assert!(max_depth > 0.0, "最大进针深度必须为正");

    let survivors: Vec<Candidate> = skin
        .iter()
        .filter_map(|p| {
            let depth = nalgebra::distance(p, target);
            (depth <= max_depth).then(|| Candidate { entry: *p, depth })
        })
        .collect();

    if survivors.len() < MIN_DEPTH_CANDIDATES {
        return Err(PlanError::InsufficientCandidates {
            survivors: survivors.len(),
            min: MIN_DEPTH_CANDIDATES,
        });
    }
    debug!(
        "深度过滤: {} 个皮肤点中保留 {} 个候选",
        skin.len(),
        survivors.len()
    );
    Ok(survivors)
}

/// 障碍规避的一个回退档位.
///
/// 档位按顺序尝试: 首档通常是全部危险器官的合并网格,
/// 次档去掉血管 (血管回避是软偏好而非硬安全约束).
pub struct ObstacleStage<'a> {
    /// 本档的障碍网格加速结构.
    pub bvh: &'a MeshBvh,
    /// 采纳本档结果所需的最少幸存候选数.
    pub min_keep: usize,
}

/// 视线障碍过滤, 按档位列表依次回退.
///
/// 候选到靶点的线段与障碍网格零相交者幸存. 第一个幸存数达到其
/// `min_keep` 的档位即被采纳, 返回幸存者与所用档位下标;
/// 全部档位都不达标时返回 [`PlanError::NoSafePath`].
///
/// # Panics
///
/// 档位列表为空时 panic.
pub fn filter_by_obstacles(
    candidates: &[Candidate],
    target: &WorldPoint,
    stages: &[ObstacleStage<'_>],
) -> PlanResult<(Vec<Candidate>, usize)> {
    assert!(!stages.is_empty(), "至少需要一个障碍档位");

    for (i, stage) in stages.iter().enumerate() {
        let survivors = line_of_sight(candidates, target, stage.bvh);
        // 空结果永远不被采纳, min_keep 为 0 也一样.
        if survivors.len() >= stage.min_keep.max(1) {
            if i > 0 {
                warn!(
                    "障碍过滤回退到第 {} 档 (放宽血管回避), 幸存 {} 个候选",
                    i,
                    survivors.len()
                );
            } else {
                debug!("障碍过滤: 首档幸存 {} 个候选", survivors.len());
            }
            return Ok((survivors, i));
        }
    }
    Err(PlanError::NoSafePath)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        /// 逐候选做线段求交 (并行路径). `rayon` 的 `collect`
        /// 保持原始顺序, 结果与串行路径一致.
        fn line_of_sight(
            candidates: &[Candidate],
            target: &WorldPoint,
            bvh: &MeshBvh,
        ) -> Vec<Candidate> {
            candidates
                .par_iter()
                .copied()
                .filter(|c| !bvh.segment_hits(&c.entry, target))
                .collect()
        }
    } else {
        /// 逐候选做线段求交.
        fn line_of_sight(
            candidates: &[Candidate],
            target: &WorldPoint,
            bvh: &MeshBvh,
        ) -> Vec<Candidate> {
            candidates
                .iter()
                .copied()
                .filter(|c| !bvh.segment_hits(&c.entry, target))
                .collect()
        }
    }
}
