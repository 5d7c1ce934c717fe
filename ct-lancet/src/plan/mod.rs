//! 穿刺路径自动规划的端到端流水线.
//!
//! 流水线是线性的: 肿瘤采样, 聚类定靶, 皮肤候选提取, 深度过滤,
//! 障碍回避, 三目标打分, 帕累托择优, 椭球消融区构建与覆盖评价.
//! 任何一针不可行都让整次规划以错误收场, 绝不输出部分针方案,
//! 因为缺针的覆盖核算对临床没有意义.

pub mod avoid;
pub mod coverage;
pub mod error;
pub mod objective;
pub mod pareto;
pub mod task;

use std::io::{self, Write};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cluster::{self, TargetCluster};
use crate::consts::plan::{ELONGATION_RATIO, FIXED_MODE_SHRINK, MIN_LOS_CANDIDATES};
use crate::consts::GEOM_EPS;
use crate::geom::{AblationEllipsoid, MeshBvh, SurfaceMesh};
use crate::sample::{self, BodyOrientation};
use crate::volume::{dilate_ball_mm, rasterize, GridSpec, MaskVolume};
use crate::WorldPoint;

use avoid::ObstacleStage;
use error::{PlanError, PlanResult};

/// 针数策略.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NeedleStrategy {
    /// 自动递增针数, 直到每个簇半径都落入最大消融半径以内.
    /// 规划前先对肿瘤掩膜做安全边界膨胀.
    Auto,
    /// 大肿瘤场景: 针数固定, 不做膨胀, 消融半径按固定比例收缩.
    Fixed {
        /// 针数.
        needles: usize,
    },
}

/// 规划配置.
///
/// 默认值即交互界面的出厂参数.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanConfig {
    /// 最大进针深度, 单位毫米.
    pub max_depth: f64,
    /// 最大消融半径, 单位毫米.
    pub max_radius: f64,
    /// 皮肤点抽稀比例, 0 表示不抽稀.
    pub skin_dedup_rate: f64,
    /// 肿瘤体素采样步长, 单位毫米, 各向同性.
    pub tumor_step_mm: f64,
    /// 安全边界膨胀半径, 单位毫米, 仅自动模式使用.
    pub safety_margin_mm: f64,
    /// 体位, 决定皮肤哪半球可作进针点.
    pub orientation: BodyOrientation,
    /// 针数策略.
    pub strategy: NeedleStrategy,
    /// 障碍网格顶点保留比例, 控制障碍点云密度.
    pub obstacle_keep: f64,
    /// 聚类随机源种子. 同种子同输入必然得到逐位相同的结果.
    pub seed: u64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            max_depth: 150.0,
            max_radius: 25.0,
            skin_dedup_rate: 0.03,
            tumor_step_mm: 5.0,
            safety_margin_mm: 5.0,
            orientation: BodyOrientation::Supine,
            strategy: NeedleStrategy::Auto,
            obstacle_keep: 0.1,
            seed: 0,
        }
    }
}

impl PlanConfig {
    fn validate(&self) {
        assert!(self.max_depth > 0.0, "最大进针深度必须为正");
        assert!(self.max_radius > 0.0, "最大消融半径必须为正");
        assert!(self.skin_dedup_rate >= 0.0, "皮肤抽稀比例不能为负");
        assert!(self.tumor_step_mm > 0.0, "肿瘤采样步长必须为正");
        assert!(self.safety_margin_mm >= 0.0, "安全边界半径不能为负");
        assert!(self.obstacle_keep > 0.0, "障碍顶点保留比例必须为正");
        if let NeedleStrategy::Fixed { needles } = self.strategy {
            assert!(needles >= 1, "固定针数必须至少为 1");
        }
    }
}

/// 规划输入: 肿瘤标签掩膜与全部相关表面网格.
///
/// 流水线不修改输入, 全部派生数据都是每次运行新分配的.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanInput {
    /// 肿瘤标签掩膜.
    pub tumor: MaskVolume,
    /// 肺实质表面.
    pub lung: SurfaceMesh,
    /// 皮肤表面.
    pub skin: SurfaceMesh,
    /// 气道表面.
    pub airway: SurfaceMesh,
    /// 血管表面.
    pub vessels: SurfaceMesh,
    /// 骨骼表面.
    pub skeleton: SurfaceMesh,
}

/// 单针方案.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NeedlePlan {
    /// 皮肤进针点.
    pub entry: WorldPoint,
    /// 消融靶点, 即簇质心.
    pub target: WorldPoint,
    /// 消融半径, 单位毫米.
    pub ablation_radius: f64,
    /// 本针的肿瘤覆盖率.
    pub ac: f64,
    /// 本针的过度消融率.
    pub oa: f64,
    /// 本针是否经过了血管回避放宽.
    pub relaxed_vessels: bool,
    /// 消融区表面网格, 供可视化使用.
    pub zone_mesh: SurfaceMesh,
}

impl NeedlePlan {
    /// 进针深度, 单位毫米.
    #[inline]
    pub fn depth(&self) -> f64 {
        nalgebra::distance(&self.entry, &self.target)
    }

    /// 针杆线段: 从进针点到越过靶点 `overshoot_mm` 的针尖.
    ///
    /// 进针点与靶点重合时退化为零长线段.
    pub fn shaft_line(&self, overshoot_mm: f64) -> (WorldPoint, WorldPoint) {
        let dir = self.target - self.entry;
        let norm = dir.norm();
        if norm < GEOM_EPS {
            return (self.entry, self.target);
        }
        (self.entry, self.target + dir * (overshoot_mm / norm))
    }
}

/// 一次规划的完整结果.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanReport {
    /// 各针方案, 至少一针.
    pub needles: Vec<NeedlePlan>,
    /// 全部消融区并集的 (AC, OA). 自动模式以膨胀后掩膜为覆盖参考,
    /// 固定针数模式以原始掩膜为参考; 逐针值用同一参考.
    pub aggregate: (f64, f64),
    /// 自动模式下经安全边界膨胀的肿瘤掩膜; 固定针数模式为 `None`.
    pub dilated_tumor: Option<MaskVolume>,
}

impl PlanReport {
    /// 针数.
    #[inline]
    pub fn needle_count(&self) -> usize {
        self.needles.len()
    }

    /// 把规划结果渲染为临床摘要文本.
    ///
    /// 百分数只在此处舍入, 结构体里保存的始终是全精度值.
    pub fn describe_into<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "共规划 {} 针", self.needles.len())?;
        for (i, n) in self.needles.iter().enumerate() {
            writeln!(
                out,
                "第 {} 针: 进针点 ({:.1}, {:.1}, {:.1}), 靶点 ({:.1}, {:.1}, {:.1})",
                i + 1,
                n.entry.x,
                n.entry.y,
                n.entry.z,
                n.target.x,
                n.target.y,
                n.target.z,
            )?;
            write!(
                out,
                "  进针深度 {:.1} mm, 消融半径 {:.1} mm, AC {:.2}%, OA {:.2}%",
                n.depth(),
                n.ablation_radius,
                n.ac * 100.0,
                n.oa * 100.0,
            )?;
            if n.relaxed_vessels {
                write!(out, ", 已放宽血管回避")?;
            }
            writeln!(out)?;
        }
        writeln!(
            out,
            "聚合覆盖: AC {:.2}%, OA {:.2}%",
            self.aggregate.0 * 100.0,
            self.aggregate.1 * 100.0
        )
    }
}

/// 执行完整的路径规划流水线.
///
/// 失败即中止: 任何一针的靶点找不到可行路径, 整次规划返回错误.
///
/// # Panics
///
/// 配置字段越界 (见 [`PlanConfig`] 各字段约束) 时 panic.
pub fn run_plan(input: &PlanInput, config: &PlanConfig) -> PlanResult<PlanReport> {
    config.validate();
    let mut rng = StdRng::seed_from_u64(config.seed);

    let (clusters, dilated) = cluster_targets(input, config, &mut rng)?;
    info!("靶点聚类完成: {} 针", clusters.len());

    // 冠状面取皮肤包围盒中点, 体位决定保留哪半球.
    let clip_y = input.skin.bounds().center().y;
    let skin_points = sample::extract_skin(
        &input.skin,
        config.skin_dedup_rate,
        clip_y,
        config.orientation,
    );
    debug!("皮肤候选点: {} 个", skin_points.len());

    let obstacles = ObstacleSet::build(input, config.obstacle_keep);
    let grid = input.tumor.spec();

    let mut picks = Vec::with_capacity(clusters.len());
    let mut zones = Vec::with_capacity(clusters.len());
    for c in &clusters {
        let (pick, mask) = plan_needle(c, &skin_points, &obstacles, &grid, config)?;
        picks.push(pick);
        zones.push(mask);
    }

    // 自动模式的覆盖分母是含安全边界的膨胀掩膜, 固定针数模式才用原始掩膜.
    // 膨胀不改变网格规格, 消融区仍在同一网格上计数.
    let cov = coverage::coverage(dilated.as_ref().unwrap_or(&input.tumor), &zones);
    let needles = picks
        .into_iter()
        .zip(&cov.per_needle)
        .map(|(p, &(ac, oa))| NeedlePlan {
            entry: p.entry,
            target: p.target,
            ablation_radius: p.radius,
            ac,
            oa,
            relaxed_vessels: p.relaxed,
            zone_mesh: p.mesh,
        })
        .collect();
    info!(
        "规划完成: 聚合 AC = {:.4}, OA = {:.4}",
        cov.aggregate.0, cov.aggregate.1
    );
    Ok(PlanReport {
        needles,
        aggregate: cov.aggregate,
        dilated_tumor: dilated,
    })
}

/// 按策略抽取肿瘤采样点并聚类出靶点.
///
/// 自动模式先做安全边界膨胀再采样, 并把膨胀结果交给调用方;
/// 固定针数模式直接在原始掩膜上采样.
fn cluster_targets(
    input: &PlanInput,
    config: &PlanConfig,
    rng: &mut StdRng,
) -> PlanResult<(Vec<TargetCluster>, Option<MaskVolume>)> {
    match config.strategy {
        NeedleStrategy::Auto => {
            let dilated = dilate_ball_mm(&input.tumor, config.safety_margin_mm);
            let pt = sample::extract_tumor(&dilated, config.tumor_step_mm);
            debug!("肿瘤采样点 (膨胀后): {} 个", pt.len());
            let clusters = cluster::cluster(&pt, config.max_radius, rng)?;
            Ok((clusters, Some(dilated)))
        }
        NeedleStrategy::Fixed { needles } => {
            let pt = sample::extract_tumor(&input.tumor, config.tumor_step_mm);
            debug!("肿瘤采样点: {} 个", pt.len());
            let clusters = cluster::cluster_fixed(&pt, needles, rng)?;
            Ok((clusters, None))
        }
    }
}

/// 一次规划中全部针共享的障碍求交结构.
struct ObstacleSet {
    /// 气道 + 血管 + 骨骼.
    full: MeshBvh,
    /// 气道 + 骨骼, 血管回避放宽后的回退档.
    reduced: MeshBvh,
    /// 肺表面, 用于胸壁厚度与肺内长度.
    lung: MeshBvh,
    /// 障碍点云, 用于最小障碍距离评分.
    points: Vec<WorldPoint>,
}

impl ObstacleSet {
    fn build(input: &PlanInput, keep: f64) -> Self {
        let (merged, points) = sample::extract_obstacle_points(
            [&input.airway, &input.vessels, &input.skeleton],
            keep,
        );
        let reduced = SurfaceMesh::merged([&input.airway, &input.skeleton]);
        debug!("障碍点云: {} 个采样点", points.len());
        Self {
            full: MeshBvh::build(&merged),
            reduced: MeshBvh::build(&reduced),
            lung: MeshBvh::build(&input.lung),
            points,
        }
    }
}

/// 覆盖度量回填前的单针中间结果.
struct PickedNeedle {
    entry: WorldPoint,
    target: WorldPoint,
    radius: f64,
    relaxed: bool,
    mesh: SurfaceMesh,
}

/// 为单个靶点簇挑选进针路径并构建消融区.
fn plan_needle(
    cluster: &TargetCluster,
    skin: &[WorldPoint],
    obstacles: &ObstacleSet,
    grid: &GridSpec,
    config: &PlanConfig,
) -> PlanResult<(PickedNeedle, MaskVolume)> {
    let target = cluster.center;

    let candidates = avoid::filter_by_depth(skin, &target, config.max_depth)?;
    let stages = [
        ObstacleStage {
            bvh: &obstacles.full,
            min_keep: MIN_LOS_CANDIDATES,
        },
        ObstacleStage {
            bvh: &obstacles.reduced,
            min_keep: 1,
        },
    ];
    let (survivors, stage) = avoid::filter_by_obstacles(&candidates, &target, &stages)?;

    let matrix = objective::evaluate(&survivors, &target, &obstacles.points, &obstacles.lung);
    let best = pareto::select(matrix.rows()).ok_or(PlanError::NoSafePath)?;
    let entry = survivors[best].entry;

    // 单点簇半径为 0, 以采样步长作为点云分辨率下界兜底.
    let raw = cluster.radius.max(config.tumor_step_mm);
    let (radius, semi_axes) = match config.strategy {
        NeedleStrategy::Auto => (raw, [raw * ELONGATION_RATIO, raw, raw]),
        NeedleStrategy::Fixed { .. } => {
            let r = raw / FIXED_MODE_SHRINK;
            (r, [r, r / ELONGATION_RATIO, r / ELONGATION_RATIO])
        }
    };
    let ell = AblationEllipsoid::aligned(&entry, &target, semi_axes);

    Ok((
        PickedNeedle {
            entry,
            target,
            radius,
            relaxed: stage > 0,
            mesh: ell.surface_mesh(32, 32),
        },
        rasterize(&ell, grid),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::mask::FOREGROUND;
    use nalgebra::Point3;

    /// 以 `center` 为球心, `r` 为半径的球面网格.
    fn ball_mesh(center: WorldPoint, r: f64) -> SurfaceMesh {
        let entry = Point3::new(center.x - 1.0, center.y, center.z);
        AblationEllipsoid::aligned(&entry, &center, [r, r, r]).surface_mesh(24, 24)
    }

    /// 原点处半径 `r` 的球形肿瘤掩膜, 2mm 各向同性体素.
    fn ball_mask(r: f64) -> MaskVolume {
        let mut m = MaskVolume::zeros(
            (40, 40, 40),
            [2.0, 2.0, 2.0],
            Point3::new(-40.0, -40.0, -40.0),
        );
        for z in 0..40 {
            for y in 0..40 {
                for x in 0..40 {
                    if (m.world_at((z, y, x)) - Point3::origin()).norm() <= r {
                        m[(z, y, x)] = FOREGROUND;
                    }
                }
            }
        }
        m
    }

    /// 合成胸腔: 原点肿瘤, 同心肺与皮肤球, 危险器官全部偏居
    /// `y > 0` 半空间, 因而不干扰仰卧位的进针路径.
    fn phantom() -> PlanInput {
        let o = Point3::origin();
        PlanInput {
            tumor: ball_mask(10.0),
            lung: ball_mesh(o, 60.0),
            skin: ball_mesh(o, 150.0),
            airway: ball_mesh(Point3::new(0.0, 80.0, 0.0), 10.0),
            vessels: ball_mesh(Point3::new(30.0, 40.0, 0.0), 8.0),
            skeleton: ball_mesh(Point3::new(-40.0, 60.0, 0.0), 10.0),
        }
    }

    fn config() -> PlanConfig {
        PlanConfig {
            max_depth: 200.0,
            ..PlanConfig::default()
        }
    }

    #[test]
    fn test_auto_mode_plans_single_needle() {
        let report = run_plan(&phantom(), &config()).unwrap();

        assert_eq!(report.needle_count(), 1);
        let n = &report.needles[0];
        // 仰卧位只允许下半球进针.
        assert!(n.entry.y <= 1e-9);
        assert!(n.ablation_radius > 0.0);
        assert!(!n.relaxed_vessels);
        assert!(!n.zone_mesh.is_empty());

        // 覆盖分母是膨胀后掩膜: 单针椭球只包住其中一部分,
        // 但整个椭球都落在安全边界以内, 不产生外溢.
        assert!(report.aggregate.0 > 0.3);
        assert_eq!(report.aggregate.1, 0.0);
        // 单针时逐针值就是聚合值.
        assert_eq!((n.ac, n.oa), report.aggregate);

        let dilated = report.dilated_tumor.unwrap();
        assert!(dilated.foreground_count() > phantom().tumor.foreground_count());
    }

    /// 自动模式的覆盖值必须以膨胀后掩膜为分母, 用原始掩膜会把覆盖率说大.
    #[test]
    fn test_coverage_reference_is_dilated_mask() {
        let input = phantom();
        let report = run_plan(&input, &config()).unwrap();
        let dilated = report.dilated_tumor.as_ref().unwrap();

        // 由报告里的针参数原样重建各消融区.
        let zones: Vec<MaskVolume> = report
            .needles
            .iter()
            .map(|n| {
                let r = n.ablation_radius;
                let ell =
                    AblationEllipsoid::aligned(&n.entry, &n.target, [r * ELONGATION_RATIO, r, r]);
                rasterize(&ell, &dilated.spec())
            })
            .collect();

        let dil = coverage::coverage(dilated, &zones);
        assert_eq!(report.aggregate.0.to_bits(), dil.aggregate.0.to_bits());
        assert_eq!(report.aggregate.1.to_bits(), dil.aggregate.1.to_bits());
        for (n, &(ac, oa)) in report.needles.iter().zip(&dil.per_needle) {
            assert_eq!(n.ac.to_bits(), ac.to_bits());
            assert_eq!(n.oa.to_bits(), oa.to_bits());
        }

        let raw = coverage::coverage(&input.tumor, &zones);
        assert!(raw.aggregate.0 > dil.aggregate.0);
        assert_ne!(report.aggregate.0.to_bits(), raw.aggregate.0.to_bits());
    }

    #[test]
    fn test_fixed_mode_plans_requested_needles() {
        let cfg = PlanConfig {
            strategy: NeedleStrategy::Fixed { needles: 2 },
            ..config()
        };
        let report = run_plan(&phantom(), &cfg).unwrap();

        assert_eq!(report.needle_count(), 2);
        assert!(report.dilated_tumor.is_none());
        for n in &report.needles {
            assert!(n.ablation_radius > 0.0);
        }
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let input = phantom();
        let cfg = config();
        let a = run_plan(&input, &cfg).unwrap();
        let b = run_plan(&input, &cfg).unwrap();

        assert_eq!(a.needle_count(), b.needle_count());
        for (x, y) in a.needles.iter().zip(&b.needles) {
            assert_eq!(x.entry.coords.map(f64::to_bits), y.entry.coords.map(f64::to_bits));
            assert_eq!(x.ablation_radius.to_bits(), y.ablation_radius.to_bits());
            assert_eq!(x.ac.to_bits(), y.ac.to_bits());
            assert_eq!(x.oa.to_bits(), y.oa.to_bits());
        }
        assert_eq!(a.aggregate.0.to_bits(), b.aggregate.0.to_bits());
        assert_eq!(a.aggregate.1.to_bits(), b.aggregate.1.to_bits());
    }

    #[test]
    fn test_enclosing_shell_yields_no_safe_path() {
        // 三类危险器官都换成包裹靶区的球壳: 放宽血管也无济于事.
        let shell = ball_mesh(Point3::origin(), 20.0);
        let input = PlanInput {
            airway: shell.clone(),
            vessels: shell.clone(),
            skeleton: shell,
            ..phantom()
        };
        assert_eq!(run_plan(&input, &config()).unwrap_err(), PlanError::NoSafePath);
    }

    #[test]
    fn test_shallow_depth_limit_reports_candidate_shortage() {
        let cfg = PlanConfig {
            max_depth: 50.0,
            ..config()
        };
        // 皮肤球半径 150, 深度上限 50: 一个候选都剩不下.
        assert!(matches!(
            run_plan(&phantom(), &cfg).unwrap_err(),
            PlanError::InsufficientCandidates { survivors: 0, .. }
        ));
    }

    #[test]
    fn test_report_text_mentions_needles_and_coverage() {
        let report = run_plan(&phantom(), &config()).unwrap();
        let mut buf = Vec::new();
        report.describe_into(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("共规划 1 针"));
        assert!(text.contains("消融半径"));
        assert!(text.contains("聚合覆盖"));
    }

    #[test]
    fn test_shaft_line_overshoots_past_target() {
        let n = NeedlePlan {
            entry: Point3::new(10.0, 0.0, 0.0),
            target: Point3::origin(),
            ablation_radius: 5.0,
            ac: 0.0,
            oa: 0.0,
            relaxed_vessels: false,
            zone_mesh: SurfaceMesh::default(),
        };
        let (start, end) = n.shaft_line(6.0);
        assert_eq!(start, n.entry);
        assert!((end.x - (-6.0)).abs() < 1e-12);
        assert!(end.y.abs() < 1e-12 && end.z.abs() < 1e-12);
    }
}
