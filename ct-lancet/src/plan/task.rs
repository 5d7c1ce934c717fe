//! 后台规划任务: 工作线程加单条终止消息.
//!
//! 调用方把输入连同配置一次性交给工作线程, 既无进度流也无取消;
//! 结果以单条消息投递, 要么成功的报告, 要么失败原因.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use log::debug;

use super::error::{PlanError, PlanResult};
use super::{run_plan, PlanConfig, PlanInput, PlanReport};

/// 一次已派发的后台规划.
///
/// 句柄被直接丢弃时任务在后台自行跑完, 结果被丢弃.
pub struct PlanTask {
    rx: Receiver<PlanResult<PlanReport>>,
    handle: JoinHandle<()>,
}

/// 在新线程上派发一次完整规划.
///
/// # Panics
///
/// 配置违例在派发前就地引爆, 不折叠成 [`PlanError::TaskFailed`].
pub fn spawn_plan(input: PlanInput, config: PlanConfig) -> PlanTask {
    config.validate();
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        // 接收端先行退出时结果无处投递, 丢弃即可.
        let _ = tx.send(run_plan(&input, &config));
    });
    debug!("后台规划任务已派发");
    PlanTask { rx, handle }
}

impl PlanTask {
    /// 阻塞等待任务结束并取回结果.
    ///
    /// 工作线程异常终止 (未投递任何消息) 时返回
    /// [`PlanError::TaskFailed`].
    pub fn wait(self) -> PlanResult<PlanReport> {
        let outcome = self.rx.recv().unwrap_or(Err(PlanError::TaskFailed));
        let _ = self.handle.join();
        outcome
    }

    /// 非阻塞探询.
    ///
    /// 任务仍在运行时返回 `None`. 终止消息只投递一条,
    /// 被取走之后任务即告结束, 不应再探询.
    pub fn poll(&mut self) -> Option<PlanResult<PlanReport>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PlanError::TaskFailed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::mask::FOREGROUND;
    use crate::geom::{AblationEllipsoid, SurfaceMesh};
    use crate::volume::MaskVolume;
    use crate::WorldPoint;
    use nalgebra::Point3;
    use std::time::Duration;

    fn ball_mesh(center: WorldPoint, r: f64, stacks: usize, slices: usize) -> SurfaceMesh {
        let entry = Point3::new(center.x - 1.0, center.y, center.z);
        AblationEllipsoid::aligned(&entry, &center, [r, r, r]).surface_mesh(stacks, slices)
    }

    /// 立即失败的输入: 肿瘤掩膜全空.
    fn hollow_input() -> PlanInput {
        PlanInput {
            tumor: MaskVolume::zeros((8, 8, 8), [1.0, 1.0, 1.0], Point3::origin()),
            lung: SurfaceMesh::default(),
            skin: SurfaceMesh::default(),
            airway: SurfaceMesh::default(),
            vessels: SurfaceMesh::default(),
            skeleton: SurfaceMesh::default(),
        }
    }

    /// 可成功规划的小型合成胸腔.
    fn solid_input() -> PlanInput {
        let o = Point3::origin();
        let mut tumor = MaskVolume::zeros(
            (30, 30, 30),
            [2.0, 2.0, 2.0],
            Point3::new(-30.0, -30.0, -30.0),
        );
        for z in 0..30 {
            for y in 0..30 {
                for x in 0..30 {
                    if (tumor.world_at((z, y, x)) - o).norm() <= 8.0 {
                        tumor[(z, y, x)] = FOREGROUND;
                    }
                }
            }
        }
        PlanInput {
            tumor,
            lung: ball_mesh(o, 40.0, 16, 20),
            skin: ball_mesh(o, 100.0, 16, 20),
            airway: ball_mesh(Point3::new(0.0, 60.0, 0.0), 8.0, 16, 20),
            vessels: ball_mesh(Point3::new(20.0, 30.0, 0.0), 6.0, 16, 20),
            skeleton: ball_mesh(Point3::new(-25.0, 40.0, 0.0), 8.0, 16, 20),
        }
    }

    #[test]
    fn test_wait_delivers_failure_reason() {
        let task = spawn_plan(hollow_input(), PlanConfig::default());
        assert!(matches!(
            task.wait(),
            Err(PlanError::InsufficientSamples { have: 0, .. })
        ));
    }

    #[test]
    fn test_wait_delivers_success_payload() {
        let config = PlanConfig {
            skin_dedup_rate: 0.0,
            ..PlanConfig::default()
        };
        let report = spawn_plan(solid_input(), config).wait().unwrap();
        assert_eq!(report.needle_count(), 1);
        assert!(report.aggregate.0 > 0.0);
    }

    #[test]
    fn test_poll_eventually_returns_outcome() {
        let mut task = spawn_plan(hollow_input(), PlanConfig::default());
        for _ in 0..5000 {
            if let Some(outcome) = task.poll() {
                assert!(outcome.is_err());
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("后台任务超时未结束");
    }

    #[test]
    fn test_dropping_task_detaches_worker() {
        // 只验证丢弃句柄不会阻塞或 panic.
        let _ = spawn_plan(hollow_input(), PlanConfig::default());
    }
}
