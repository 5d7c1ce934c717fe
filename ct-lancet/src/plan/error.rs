//! 规划流程的失败类别.

use std::error::Error;
use std::fmt;

/// 规划失败的原因.
///
/// 每个变体都对应一条可直接呈现给调用方的失败说明 (见 `Display` 实现);
/// 任何一根针失败都会中止整次规划, 不产出部分结果. 除障碍过滤内置的
/// 血管回避松弛外, 流程内部不做重试, 只能由调用方调整配置后重新运行.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlanError {
    /// 肿瘤采样点数不足以划分出要求的簇数.
    InsufficientSamples {
        /// 实际采样点数.
        have: usize,
        /// 需要的最小点数.
        need: usize,
    },

    /// 深度过滤后剩余皮肤候选点过少.
    ///
    /// 几乎总意味着体位标志设反或最大进针深度配置过小,
    /// 而不是真的没有可行入针区域.
    InsufficientCandidates {
        /// 幸存候选点数.
        survivors: usize,
        /// 允许继续规划的最小候选点数.
        min: usize,
    },

    /// 放宽血管回避后仍不存在无碰撞的进针路径.
    NoSafePath,

    /// 后台规划任务异常终止 (工作线程 panic 或通道断开).
    TaskFailed,
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientSamples { have, need } => write!(
                f,
                "肿瘤采样点数不足: 仅 {have} 个, 至少需要 {need} 个, 请检查肿瘤掩膜或采样步长"
            ),
            Self::InsufficientCandidates { survivors, min } => write!(
                f,
                "深度过滤后仅剩 {survivors} 个皮肤候选点 (最少 {min} 个), \
                 请检查体位设置或最大进针深度"
            ),
            Self::NoSafePath => {
                write!(f, "放宽血管回避后仍未找到无碰撞的进针路径")
            }
            Self::TaskFailed => write!(f, "后台规划任务异常终止"),
        }
    }
}

impl Error for PlanError {}

/// 规划流程的统一结果别名.
pub type PlanResult<T> = Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_counts() {
        let e = PlanError::InsufficientCandidates {
            survivors: 37,
            min: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("37"));
        assert!(msg.contains("100"));
        assert!(msg.contains("体位"));
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_error<E: Error>(_: &E) {}
        assert_error(&PlanError::NoSafePath);
    }
}
