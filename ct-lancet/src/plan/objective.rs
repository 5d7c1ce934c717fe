//! 软约束打分: 三项风险目标与逐列归一化.

use log::warn;

use super::avoid::Candidate;
use crate::consts::GEOM_EPS;
use crate::geom::{segment_distance, MeshBvh};
use crate::WorldPoint;

/// 进针线段未命中肺表面时的占位值, 归一化前替换为同列最大值.
const LUNG_MISS: f64 = -1.0;

/// 幸存候选的风险打分矩阵.
///
/// 行与候选一一对应, 三列依次为危险器官贴近度, 胸壁厚度与
/// 肺内长度, 均已归一化到 `[0, 1]` 且越小越好.
#[derive(Debug, Clone)]
pub struct ObjectiveMatrix {
    rows: Vec<[f64; 3]>,
}

impl ObjectiveMatrix {
    /// 归一化后的打分行.
    #[inline]
    pub fn rows(&self) -> &[[f64; 3]] {
        &self.rows
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否没有任何行.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 对每个候选计算三项风险分并逐列 min-max 归一化.
///
/// 1. 危险器官贴近度: 全部障碍采样点到进针线段的最小距离;
/// 2. 胸壁厚度: 进针点到肺表面首个交点的距离;
/// 3. 肺内长度: 该交点到靶点的距离.
///
/// 进针线段不与肺表面相交的候选 (例如经由已在肺内的区域进针)
/// 在后两列取同列最大值作保守回退. 零极差列无法归一化,
/// 回退为常数 0 并留下警告日志, 绝不让除零逃逸.
pub fn evaluate(
    candidates: &[Candidate],
    target: &WorldPoint,
    obstacle_points: &[WorldPoint],
    lung: &MeshBvh,
) -> ObjectiveMatrix {
    if candidates.is_empty() {
        return ObjectiveMatrix { rows: Vec::new() };
    }
    let mut rows = raw_scores(candidates, target, obstacle_points, lung);

    let misses = rows.iter().filter(|r| r[1] == LUNG_MISS).count();
    if misses > 0 {
        warn!("{misses} 个候选的进针线未命中肺表面, 后两列回退为同列最大值");
    }
    // 后两列共享肺表面求交结果, 占位值一并替换.
    for col in 1..3 {
        let max = rows
            .iter()
            .map(|r| r[col])
            .fold(f64::NEG_INFINITY, f64::max);
        for r in rows.iter_mut() {
            if r[col] == LUNG_MISS {
                r[col] = max;
            }
        }
    }
    for col in 0..3 {
        normalize_column(&mut rows, col);
    }
    ObjectiveMatrix { rows }
}

/// 单个候选的三项原始风险分.
fn raw_score(
    c: &Candidate,
    target: &WorldPoint,
    obstacle_points: &[WorldPoint],
    lung: &MeshBvh,
) -> [f64; 3] {
    let dvo = if obstacle_points.is_empty() {
        0.0
    } else {
        obstacle_points
            .iter()
            .map(|po| segment_distance(po, &c.entry, target))
            .fold(f64::INFINITY, f64::min)
    };
    match lung.first_hit(&c.entry, target) {
        Some(hit) => [
            dvo,
            nalgebra::distance(&c.entry, &hit),
            nalgebra::distance(&hit, target),
        ],
        None => [dvo, LUNG_MISS, LUNG_MISS],
    }
}

/// 对第 `col` 列做 min-max 归一化, 零极差列回退为常数 0.
fn normalize_column(rows: &mut [[f64; 3]], col: usize) {
    let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, r| {
        (acc.0.min(r[col]), acc.1.max(r[col]))
    });
    let range = max - min;
    if range < GEOM_EPS {
        warn!("目标列 {} 极差为零, 全列回退为常数 0", col);
        for r in rows.iter_mut() {
            r[col] = 0.0;
        }
    } else {
        for r in rows.iter_mut() {
            r[col] = (r[col] - min) / range;
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        /// 逐候选打分 (并行路径, 行序与输入一致).
        fn raw_scores(
            candidates: &[Candidate],
            target: &WorldPoint,
            obstacle_points: &[WorldPoint],
            lung: &MeshBvh,
        ) -> Vec<[f64; 3]> {
            candidates
                .par_iter()
                .map(|c| raw_score(c, target, obstacle_points, lung))
                .collect()
        }
    } else {
        /// 逐候选打分.
        fn raw_scores(
            candidates: &[Candidate],
            target: &WorldPoint,
            obstacle_points: &[WorldPoint],
            lung: &MeshBvh,
        ) -> Vec<[f64; 3]> {
            candidates
                .iter()
                .map(|c| raw_score(c, target, obstacle_points, lung))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::SurfaceMesh;
    use nalgebra::Point3;

    fn candidate(x: f64, y: f64, z: f64, target: &WorldPoint) -> Candidate {
        let entry = Point3::new(x, y, z);
        Candidate {
            entry,
            depth: nalgebra::distance(&entry, target),
        }
    }

    /// x = `x` 处一面足够大的方形墙 (两个三角形).
    fn wall(x: f64) -> SurfaceMesh {
        let s = 500.0;
        SurfaceMesh::new(
            vec![
                Point3::new(x, -s, -s),
                Point3::new(x, s, -s),
                Point3::new(x, s, s),
                Point3::new(x, -s, s),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_scores_lie_in_unit_interval() {
        let target = Point3::new(0.0, 0.0, 0.0);
        let lung = MeshBvh::build(&wall(10.0));
        let obstacles = vec![
            Point3::new(15.0, 4.0, 0.0),
            Point3::new(25.0, -7.0, 2.0),
            Point3::new(18.0, 0.0, 9.0),
        ];
        let cands: Vec<Candidate> = (0..12)
            .map(|i| candidate(40.0, i as f64 * 3.0 - 18.0, (i % 4) as f64, &target))
            .collect();

        let m = evaluate(&cands, &target, &obstacles, &lung);
        assert_eq!(m.len(), cands.len());
        for row in m.rows() {
            for v in row {
                assert!(v.is_finite());
                assert!((0.0..=1.0).contains(v));
            }
        }
    }

    #[test]
    fn test_constant_columns_collapse_to_zero() {
        let _ = simple_logger::init_with_level(log::Level::Warn);
        let target = Point3::new(0.0, 0.0, 0.0);
        let lung = MeshBvh::build(&wall(10.0));
        let obstacles = vec![Point3::new(20.0, 5.0, 0.0)];
        // 完全相同的候选: 三列极差均为零.
        let cands = vec![candidate(40.0, 0.0, 0.0, &target); 4];

        let m = evaluate(&cands, &target, &obstacles, &lung);
        for row in m.rows() {
            assert_eq!(*row, [0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_lung_miss_takes_column_maximum() {
        let target = Point3::new(0.0, 0.0, 0.0);
        // 墙只盖住 y ≥ -5 的区域, 第三个候选的进针线从墙外绕过.
        let s = 500.0;
        let lung = MeshBvh::build(&SurfaceMesh::new(
            vec![
                Point3::new(10.0, -5.0, -s),
                Point3::new(10.0, s, -s),
                Point3::new(10.0, s, s),
                Point3::new(10.0, -5.0, s),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        ));
        let cands = vec![
            candidate(20.0, 0.0, 0.0, &target),
            candidate(40.0, 0.0, 0.0, &target),
            candidate(40.0, -400.0, 0.0, &target),
        ];

        let m = evaluate(&cands, &target, &[], &lung);
        // 命中者胸壁厚度 10 与 30, 归一化为 0 与 1; 未命中者取列最大.
        assert_eq!(m.rows()[0][1], 0.0);
        assert_eq!(m.rows()[1][1], 1.0);
        assert_eq!(m.rows()[2][1], 1.0);
    }

    #[test]
    fn test_empty_candidate_set_yields_empty_matrix() {
        let target = Point3::new(0.0, 0.0, 0.0);
        let lung = MeshBvh::build(&SurfaceMesh::default());
        let m = evaluate(&[], &target, &[], &lung);
        assert!(m.is_empty());
    }
}
