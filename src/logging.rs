// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=mos_evaluator::engine=trace
///
/// # 参数
/// - trace: 命令行开启 --trace 时，若未设置 RUST_LOG，则本 crate 提升为 debug
///
/// # 示例
/// ```no_run
/// use mos_evaluator::logging;
/// logging::init(false);
/// ```
pub fn init(trace: bool) {
    let default_directive = if trace { "info,mos_evaluator=debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // 多线程运行时保留线程 ID，便于对照步长分配
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
