// ==========================================
// MOS 统计订正系统 - 引擎层错误类型
// ==========================================
// 分类:
// - 非致命: 该时效无权重 / 缺测策略要求跳过 → 记录日志，继续下一时效
// - 致命: 配置错误、外部数据失败、数值不变量违反 → 终止整个运行
// ==========================================

use crate::config::ConfigError;
use crate::domain::WeightShapeError;
use crate::field::FieldError;
use crate::output::OutputError;
use crate::repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 非致命 =====
    #[error("无可用权重: param={param} step={step}")]
    NoDataForStep { param: String, step: i32 },

    #[error("跳过该时效: param={param} step={step} ({reason})")]
    StepSkipped { param: String, step: i32, reason: String },

    // ===== 因子值 =====
    #[error("因子缺测: station={station} predictor={predictor} step={step}")]
    MissingPredictorValue {
        station: i64,
        predictor: String,
        step: i32,
    },

    #[error("数值不变量违反: {0}")]
    NumericInvariant(String),

    #[error("时效无效: {0}")]
    InvalidStep(String),

    // ===== 外部依赖 =====
    #[error("仓储错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("场数据错误: {0}")]
    Field(#[from] FieldError),

    #[error("结果写出失败: {0}")]
    Output(#[from] OutputError),

    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("连接池错误: {0}")]
    Pool(String),

    #[error("工作线程 {0} 异常退出")]
    WorkerPanic(usize),
}

impl EngineError {
    /// 是否终止整个运行
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::NoDataForStep { .. } | EngineError::StepSkipped { .. }
        )
    }
}

impl From<WeightShapeError> for EngineError {
    fn from(err: WeightShapeError) -> Self {
        EngineError::NumericInvariant(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
