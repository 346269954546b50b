// ==========================================
// MOS 统计订正系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 站点回归权重 × 数值模式预报因子 → 站点订正预报
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 权重读取与审计轨迹
pub mod repository;

// 场数据层 - 数值模式输出
pub mod field;

// 引擎层 - 因子解析与订正计算
pub mod engine;

// 结果写出
pub mod output;

// 配置层 - 命令行与持久化配置
pub mod config;

// 应用层 - 运行装配
pub mod app;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 连接池
pub mod pool;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    BlendMode, ClimatePeriod, InterpolationMethod, MissingValuePolicy, PeriodBounds, PredictorIdentity,
    PredictorSet, RunContext, RunInfo, Station, StationForecast, StepScheme, WeightTable,
};

// 仓储
pub use repository::{FileWeightRepository, SqliteWeightRepository, WeightRepository};

// 场数据
pub use field::{FieldProvider, SqliteFieldProvider};

// 引擎
pub use engine::{run_workers, EngineError, Evaluator, RunSummary, ValueResolver, WorkDistributor};

// 结果写出
pub use output::{CsvResultWriter, ResultWriter};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "MOS 统计订正预报";
