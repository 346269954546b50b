// ==========================================
// MOS 统计订正系统 - 命令行主入口
// ==========================================
// 退出码: 0 = 成功（可能有被跳过的时效）；1 = 致命错误
// ==========================================

use clap::Parser;
use mos_evaluator::config::CliOptions;
use mos_evaluator::{app, logging};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = CliOptions::parse();

    // 初始化日志系统
    logging::init(cli.trace);

    info!("==================================================");
    info!("{} {}", mos_evaluator::APP_NAME, mos_evaluator::VERSION);
    info!("==================================================");

    let opts = match cli.validate() {
        Ok(opts) => opts,
        Err(e) => {
            error!(error = %e, "参数错误");
            eprintln!("参数错误: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match app::run(&opts) {
        Ok(summary) => {
            info!(
                steps = summary.steps,
                files = summary.files,
                skipped = summary.skipped,
                "运行结束"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "运行失败");
            eprintln!("运行失败: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
