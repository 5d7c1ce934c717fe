//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, WorldPoint, WorldVec};

pub use crate::geom::{Aabb, AblationEllipsoid, MeshBvh, SurfaceMesh};
pub use crate::volume::{dilate_ball_mm, rasterize, GridSpec, MaskVolume};

pub use crate::cluster::{cluster, cluster_fixed, TargetCluster};
pub use crate::sample::{extract_obstacle_points, extract_skin, extract_tumor, BodyOrientation};

pub use crate::plan::avoid::{filter_by_depth, filter_by_obstacles, Candidate, ObstacleStage};
pub use crate::plan::coverage::{coverage, CoverageResult};
pub use crate::plan::error::{PlanError, PlanResult};
pub use crate::plan::task::{spawn_plan, PlanTask};
pub use crate::plan::{
    run_plan, NeedlePlan, NeedleStrategy, PlanConfig, PlanInput, PlanReport,
};

pub use crate::consts::mask::{BACKGROUND, FOREGROUND};
