// ==========================================
// MOS 统计订正系统 - 预报因子标识
// ==========================================
// 文本格式: PARAM/LEVEL/VALUE[/STEP_ADJ[/ORIGIN_ADJ]]
// 例: T-K/GROUND/0, T-K/PRESSURE/925/-1, T-MEAN-K/GROUND/0/0/-1
// 红线: step_adjustment 必须 ≤ 0, origin_time_adjustment ∈ {0, -1}
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// 截距因子参数名
pub const INTERCEPT_PARAM: &str = "INTERCEPT-N";

/// 太阳赤纬因子参数名（解析计算，不查场）
pub const DECLINATION_PARAM: &str = "DECLINATION-N";

/// 因子标识解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictorParseError {
    #[error("因子标识格式错误: '{0}'（期望 PARAM/LEVEL/VALUE[/STEP_ADJ[/ORIGIN_ADJ]]）")]
    Format(String),

    #[error("因子标识 '{key}' 字段 {field} 无法解析")]
    Number { key: String, field: &'static str },

    #[error("因子 '{0}' 的时效调整为正数（只允许引用更早的时效）")]
    PositiveStepAdjustment(String),

    #[error("因子 '{0}' 的起报时间调整只能为 0 或 -1")]
    InvalidOriginAdjustment(String),
}

// ==========================================
// PredictorIdentity - 预报因子标识
// ==========================================
/// 不可变值对象，相等性覆盖全部字段（level_value 按位比较）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorIdentity {
    param_name: String,
    level_name: String,
    level_value: f64,
    step_adjustment: i32,
    origin_time_adjustment: i32,
}

impl PredictorIdentity {
    /// 构造并校验
    pub fn new(
        param_name: impl Into<String>,
        level_name: impl Into<String>,
        level_value: f64,
        step_adjustment: i32,
        origin_time_adjustment: i32,
    ) -> Result<Self, PredictorParseError> {
        let pl = Self {
            param_name: param_name.into(),
            level_name: level_name.into(),
            level_value,
            step_adjustment,
            origin_time_adjustment,
        };

        if pl.step_adjustment > 0 {
            return Err(PredictorParseError::PositiveStepAdjustment(pl.to_string()));
        }
        if pl.origin_time_adjustment != 0 && pl.origin_time_adjustment != -1 {
            return Err(PredictorParseError::InvalidOriginAdjustment(pl.to_string()));
        }
        if !pl.level_value.is_finite() {
            return Err(PredictorParseError::Number {
                key: pl.to_string(),
                field: "level_value",
            });
        }

        Ok(pl)
    }

    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn level_value(&self) -> f64 {
        self.level_value
    }

    pub fn step_adjustment(&self) -> i32 {
        self.step_adjustment
    }

    pub fn origin_time_adjustment(&self) -> i32 {
        self.origin_time_adjustment
    }

    pub fn is_intercept(&self) -> bool {
        self.param_name == INTERCEPT_PARAM
    }

    pub fn is_declination(&self) -> bool {
        self.param_name == DECLINATION_PARAM
    }
}

impl PartialEq for PredictorIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.param_name == other.param_name
            && self.level_name == other.level_name
            && self.level_value.to_bits() == other.level_value.to_bits()
            && self.step_adjustment == other.step_adjustment
            && self.origin_time_adjustment == other.origin_time_adjustment
    }
}

impl Eq for PredictorIdentity {}

impl Hash for PredictorIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.param_name.hash(state);
        self.level_name.hash(state);
        self.level_value.to_bits().hash(state);
        self.step_adjustment.hash(state);
        self.origin_time_adjustment.hash(state);
    }
}

impl fmt::Display for PredictorIdentity {
    /// 总是输出完整五段，保证与解析结果一一对应
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.param_name,
            self.level_name,
            self.level_value,
            self.step_adjustment,
            self.origin_time_adjustment
        )
    }
}

impl FromStr for PredictorIdentity {
    type Err = PredictorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        let parts: Vec<&str> = key.split('/').map(str::trim).collect();

        if parts.len() < 3 || parts.len() > 5 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(PredictorParseError::Format(key.to_string()));
        }

        let level_value = parts[2]
            .parse::<f64>()
            .map_err(|_| PredictorParseError::Number {
                key: key.to_string(),
                field: "level_value",
            })?;

        let parse_int = |idx: usize, field: &'static str| -> Result<i32, PredictorParseError> {
            match parts.get(idx) {
                Some(v) => v.parse::<i32>().map_err(|_| PredictorParseError::Number {
                    key: key.to_string(),
                    field,
                }),
                None => Ok(0),
            }
        };

        let step_adjustment = parse_int(3, "step_adjustment")?;
        let origin_time_adjustment = parse_int(4, "origin_time_adjustment")?;

        Self::new(parts[0], parts[1], level_value, step_adjustment, origin_time_adjustment)
    }
}
