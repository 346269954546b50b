// ==========================================
// MOS 统计订正系统 - 配置层
// ==========================================
// 职责: 命令行参数校验 + 持久化配置读取
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod error;
pub mod options;

// 重导出核心配置
pub use config_manager::{config_keys, default_substitutes, ConfigManager, EvaluationConfig, CLOUD_BASE_SENTINEL_M};
pub use error::{ConfigError, ConfigResult};
pub use options::{check_analysis_hour, parse_analysis_time, CliOptions, RunOptions};
