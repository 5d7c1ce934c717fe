//! 在合成胸腔假体上运行完整规划流水线的演示程序.

mod runner;

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();
    runner::run();
}
