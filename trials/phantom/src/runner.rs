//! 试验场景驱动.

use std::io;

use ct_lancet::prelude::*;
use trial_utils::phantom;

/// 实际运行.
pub fn run() {
    trial_utils::banner("自动针数");
    auto_scenario();
    trial_utils::banner("固定双针");
    fixed_scenario();
    trial_utils::banner("障碍球壳对照");
    caged_scenario();
    trial_utils::sep();
}

fn base_config() -> PlanConfig {
    // 皮肤球半径 150mm, 默认进针深度上限会筛光候选.
    PlanConfig {
        max_depth: 200.0,
        ..PlanConfig::default()
    }
}

/// 自动针数: 派发后台任务并阻塞等待.
fn auto_scenario() {
    let task = spawn_plan(phantom::thorax(), base_config());
    match task.wait() {
        Ok(report) => print_report(&report),
        Err(e) => println!("规划失败: {e}"),
    }
}

/// 固定针数: 大肿瘤双针模式.
fn fixed_scenario() {
    let config = PlanConfig {
        strategy: NeedleStrategy::Fixed { needles: 2 },
        ..base_config()
    };
    match run_plan(&phantom::thorax(), &config) {
        Ok(report) => print_report(&report),
        Err(e) => println!("规划失败: {e}"),
    }
}

/// 靶区被障碍球壳包裹的对照: 走到 NoSafePath 失败路径.
fn caged_scenario() {
    match run_plan(&phantom::caged_thorax(), &base_config()) {
        Ok(_) => println!("不应出现: 对照场景居然规划成功"),
        Err(e) => println!("按预期失败: {e}"),
    }
}

fn print_report(report: &PlanReport) {
    let mut out = io::stdout().lock();
    report
        .describe_into(&mut out)
        .expect("写出规划摘要失败");
    for (i, n) in report.needles.iter().enumerate() {
        let (a, b) = n.shaft_line(6.0);
        println!(
            "第 {} 针针杆: ({:.1}, {:.1}, {:.1}) -> ({:.1}, {:.1}, {:.1})",
            i + 1,
            a.x,
            a.y,
            a.z,
            b.x,
            b.y,
            b.z
        );
    }
}
