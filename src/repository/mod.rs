// ==========================================
// MOS 统计订正系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供权重数据访问接口,屏蔽数据库/文件细节
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod weight_repo;
pub mod weights_file;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use weight_repo::{
    parse_weight_json, resolve_period_bounds, SqliteWeightRepository, WeightRepository, TRACE_TIME_FORMAT,
};
pub use weights_file::{FileWeightRepository, WeightsFileFilter};
