//! 带注入种子的 Lloyd k-means.

use itertools::izip;
use rand::rngs::StdRng;

use crate::WorldPoint;

/// 迭代次数上限. 正常数据在远小于该值时即收敛,
/// 上限只是为了防御病态的分配振荡.
const MAX_ITERS: usize = 128;

/// 对 `points` 做 k 均值划分, 返回 (质心, 各点所属簇下标).
///
/// 质心从输入点中无放回抽取 `k` 个初始化, 随机性完全来自 `rng`,
/// 因而同一种子得到逐位一致的结果. 迭代至分配稳定为止;
/// 迭代中变空的簇保留上一轮质心. 输出质心按字典序排序后重建分配,
/// 使结果顺序规范化.
///
/// # Panics
///
/// `k` 不在 `[1, points.len()]` 范围内时 panic.
pub(crate) fn kmeans(
    points: &[WorldPoint],
    k: usize,
    rng: &mut StdRng,
) -> (Vec<WorldPoint>, Vec<usize>) {
    assert!(
        k >= 1 && k <= points.len(),
        "簇数必须在 [1, 点数] 范围内"
    );

    let mut centroids: Vec<WorldPoint> = rand::seq::index::sample(rng, points.len(), k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut assignment = assign(points, &centroids);
    for _ in 0..MAX_ITERS {
        update_centroids(points, &assignment, &mut centroids);
        let next = assign(points, &centroids);
        if next == assignment {
            break;
        }
        assignment = next;
    }

    centroids.sort_by(|a, b| {
        a.x.total_cmp(&b.x)
            .then(a.y.total_cmp(&b.y))
            .then(a.z.total_cmp(&b.z))
    });
    let assignment = assign(points, &centroids);
    (centroids, assignment)
}

/// 把每个点分配给最近质心. 距离相同时取下标最小者.
fn assign(points: &[WorldPoint], centroids: &[WorldPoint]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_d = nalgebra::distance_squared(p, &centroids[0]);
            for (j, c) in centroids.iter().enumerate().skip(1) {
                let d = nalgebra::distance_squared(p, c);
                if d < best_d {
                    best = j;
                    best_d = d;
                }
            }
            best
        })
        .collect()
}

/// 以簇内均值更新质心; 空簇保留原质心.
fn update_centroids(
    points: &[WorldPoint],
    assignment: &[usize],
    centroids: &mut [WorldPoint],
) {
    let mut sums = vec![nalgebra::Vector3::<f64>::zeros(); centroids.len()];
    let mut counts = vec![0_usize; centroids.len()];
    for (p, &c) in izip!(points, assignment) {
        sums[c] += p.coords;
        counts[c] += 1;
    }
    for (c, sum, n) in izip!(centroids.iter_mut(), sums, counts) {
        if n > 0 {
            *c = WorldPoint::from(sum / n as f64);
        }
    }
}
