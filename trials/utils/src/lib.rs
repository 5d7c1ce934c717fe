//! 路径规划试验依赖的通用组件.

pub mod phantom;

const SEP_WIDTH: usize = 56;

/// 打印带场景标题的分隔横幅.
pub fn banner(title: &str) {
    println!("{:-^width$}", format!(" {title} "), width = SEP_WIDTH);
}

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{}", "-".repeat(SEP_WIDTH));
}
