// ==========================================
// MOS 统计订正系统 - 领域模型层
// ==========================================
// 职责: 定义预报因子、站点、权重、时段、运行上下文
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod period;
pub mod predictor;
pub mod run;
pub mod station;
pub mod types;
pub mod weight;

// 重导出核心类型
pub use period::{adjacent_period, find_period, seasonal_position, ClimatePeriod, STANDARD_SEASONS};
pub use predictor::{PredictorIdentity, PredictorParseError, DECLINATION_PARAM, INTERCEPT_PARAM};
pub use run::{RunContext, RunInfo, StationForecast};
pub use station::{Station, NETWORK_FMISID, NETWORK_WMO};
pub use types::{BlendMode, InterpolationMethod, MissingValuePolicy, StepScheme};
pub use weight::{PeriodBounds, PredictorSet, WeightShapeError, WeightTable};
