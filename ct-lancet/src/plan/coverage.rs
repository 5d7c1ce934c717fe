//! 消融覆盖度量: 逐针与聚合的 AC / OA.

use log::debug;

use crate::consts::plan::COVERAGE_EPS;
use crate::volume::MaskVolume;

/// 覆盖评价结果.
///
/// `AC` (ablation coverage) 是肿瘤被消融区覆盖的比例,
/// `OA` (over-ablation) 是消融区落在肿瘤之外的比例.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoverageResult {
    /// 每针各自的 (AC, OA), 顺序与传入的消融区一致.
    pub per_needle: Vec<(f64, f64)>,
    /// 以全部消融区体素并集计算的 (AC, OA).
    pub aggregate: (f64, f64),
}

/// 以体素计数计算每针及聚合的 AC / OA.
///
/// `AC = |T ∩ A| / (|T| + ε)`, `OA = (|A| − |T ∩ A|) / (|A| + ε)`,
/// 其中 `T` 为肿瘤掩膜, `A` 为消融区掩膜, `ε` 防除零.
/// 聚合值把 `A` 换成全部消融区的并集. 没有消融区时两项均为 0.
///
/// # Panics
///
/// 任一消融区掩膜与肿瘤掩膜网格规格不一致时 panic.
pub fn coverage(tumor: &MaskVolume, zones: &[MaskVolume]) -> CoverageResult {
    let spec = tumor.spec();
    for z in zones {
        assert!(
            spec.matches(&z.spec()),
            "覆盖度量要求消融区与肿瘤掩膜网格规格一致"
        );
    }

    let tumor_count = tumor.foreground_count();
    let per_needle: Vec<(f64, f64)> = zones.iter().map(|z| pair(tumor, tumor_count, z)).collect();

    let aggregate = match zones {
        [] => (0.0, 0.0),
        [first, rest @ ..] => {
            let mut union = first.clone();
            for z in rest {
                union.union_with(z);
            }
            pair(tumor, tumor_count, &union)
        }
    };
    debug!(
        "覆盖评价: {} 个消融区, 聚合 AC = {:.4}, OA = {:.4}",
        zones.len(),
        aggregate.0,
        aggregate.1
    );
    CoverageResult {
        per_needle,
        aggregate,
    }
}

fn pair(tumor: &MaskVolume, tumor_count: usize, zone: &MaskVolume) -> (f64, f64) {
    let inter = tumor.intersect_count(zone) as f64;
    let zone_count = zone.foreground_count() as f64;
    let ac = inter / (tumor_count as f64 + COVERAGE_EPS);
    let oa = (zone_count - inter) / (zone_count + COVERAGE_EPS);
    (ac, oa)
}
