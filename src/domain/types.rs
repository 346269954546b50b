// ==========================================
// MOS 统计订正系统 - 领域类型定义
// ==========================================
// 缺测策略 / 季节过渡模式 / 步长分档 / 插值方式
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 缺测策略 (Missing Value Policy)
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与 config_kv 一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissingValuePolicy {
    Strict,   // 任一因子缺测 → 整个运行终止
    SkipStep, // 任一因子缺测 → 跳过该参数该时效，继续运行
    #[default]
    Graceful, // 有替代值则替代，否则该因子权重置零
}

impl fmt::Display for MissingValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingValuePolicy::Strict => write!(f, "STRICT"),
            MissingValuePolicy::SkipStep => write!(f, "SKIP_STEP"),
            MissingValuePolicy::Graceful => write!(f, "GRACEFUL"),
        }
    }
}

impl FromStr for MissingValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "STRICT" => Ok(MissingValuePolicy::Strict),
            "SKIP_STEP" => Ok(MissingValuePolicy::SkipStep),
            "GRACEFUL" => Ok(MissingValuePolicy::Graceful),
            other => Err(format!("未知缺测策略: {}", other)),
        }
    }
}

// ==========================================
// 季节过渡模式 (Blend Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlendMode {
    #[default]
    Mix,         // f·当前 + (1-f)·相邻时段
    Passthrough, // 保持当前时段权重不变（历史行为）
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendMode::Mix => write!(f, "MIX"),
            BlendMode::Passthrough => write!(f, "PASSTHROUGH"),
        }
    }
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MIX" => Ok(BlendMode::Mix),
            "PASSTHROUGH" => Ok(BlendMode::Passthrough),
            other => Err(format!("未知季节过渡模式: {}", other)),
        }
    }
}

// ==========================================
// 步长分档 (Step Scheme)
// ==========================================
// 模式输出时间分辨率: ≤hourly_until 逐小时, ≤three_hourly_until 逐3小时, 之后逐6小时
// 按 MOS 标签配置（不同模式配置的分档边界不同）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepScheme {
    pub hourly_until: i32,
    pub three_hourly_until: i32,
}

/// 默认分档即 MOS_ECMWF_040422 的分档（逐小时至 90，逐3小时至 144）
///
/// 没有 `step_scheme/<label>` 配置的标签都使用该分档；
/// 时效调整需按3小时处理到 144 的标签应配置 `{"hourly_until":0,"three_hourly_until":144}`
impl Default for StepScheme {
    fn default() -> Self {
        Self {
            hourly_until: 90,
            three_hourly_until: 144,
        }
    }
}

impl StepScheme {
    /// 该时效所在分档的步长（小时）
    ///
    /// `hourly_available = false` 表示该参数没有逐小时输出，首档按3小时处理
    pub fn unit_at(&self, step: i32, hourly_available: bool) -> i32 {
        if step <= self.hourly_until && hourly_available {
            1
        } else if step <= self.three_hourly_until {
            3
        } else {
            6
        }
    }

    /// 累积量差分使用的前一时效（不小于 0）
    pub fn previous_step(&self, step: i32) -> i32 {
        (step - self.unit_at(step, true)).max(0)
    }
}

// ==========================================
// 插值方式 (Interpolation Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterpolationMethod {
    Bilinear,
    NearestPoint,
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationMethod::Bilinear => write!(f, "BILINEAR"),
            InterpolationMethod::NearestPoint => write!(f, "NEAREST_POINT"),
        }
    }
}
