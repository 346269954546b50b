// ==========================================
// MOS 统计订正系统 - 引擎层
// ==========================================
// 职责: 因子值解析、季节过渡、站点订正计算、多线程调度
// 红线: Engine 不拼 SQL，数据访问全部经由仓储 / 场提供者接口
// ==========================================

pub mod blender;
pub mod distributor;
pub mod error;
pub mod evaluator;
pub mod resolver;
pub mod rules;
pub mod solar;
pub mod worker;

// 重导出核心引擎
pub use blender::{blend, blend_factor};
pub use distributor::WorkDistributor;
pub use error::{EngineError, EngineResult};
pub use evaluator::Evaluator;
pub use resolver::{FieldKey, ResolvedValue, ValueResolver};
pub use worker::{run_workers, RunSummary};
