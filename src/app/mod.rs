// ==========================================
// MOS 统计订正系统 - 应用层
// ==========================================
// 职责: 由校验后的运行参数装配仓储、场提供者、连接池与结果写出，执行一次完整运行
// ==========================================

pub mod runner;

// 重导出
pub use runner::{resolve_origin_time, run};
