//! 通用常量.

/// 二值掩膜体素值.
pub mod mask {
    /// 掩膜中背景的体素值.
    pub const BACKGROUND: u8 = 0;

    /// 掩膜中前景 (病灶或消融区) 的体素值.
    pub const FOREGROUND: u8 = 1;

    /// 体素是否是前景?
    #[inline]
    pub const fn is_foreground(v: u8) -> bool {
        v != BACKGROUND
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(v: u8) -> bool {
        matches!(v, BACKGROUND)
    }
}

/// 路径规划阈值与固定比例.
pub mod plan {
    /// 深度过滤后允许继续规划的最少皮肤候选点数.
    ///
    /// 低于该值几乎总意味着体位标志或最大进针深度配置有误,
    /// 而不是真的没有可行入针区域.
    pub const MIN_DEPTH_CANDIDATES: usize = 100;

    /// 全障碍集合过滤后的最少候选点数, 低于该值触发血管回避松弛重试.
    pub const MIN_LOS_CANDIDATES: usize = 5;

    /// 消融椭球沿进针方向的伸长比.
    pub const ELONGATION_RATIO: f64 = 1.2;

    /// 固定针数模式下, 由簇半径推导消融半径时的收缩系数.
    pub const FIXED_MODE_SHRINK: f64 = 1.5;

    /// 覆盖率分母的防零保护项.
    pub const COVERAGE_EPS: f64 = 1e-7;
}

/// 几何计算通用容差. 用于退化方向判定, 射线平行判定与归一化零区间判定.
pub const GEOM_EPS: f64 = 1e-9;
