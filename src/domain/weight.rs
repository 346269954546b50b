// ==========================================
// MOS 统计订正系统 - 回归权重
// ==========================================
// PredictorSet: 单站点单时效的因子列表 + 权重向量 + 因子值向量
// 生命周期: 创建(仅权重) → 因子值解析后填充 values（两阶段）
// 红线: 解析后 len(predictors) == len(weights) == len(values)
// ==========================================

use crate::domain::predictor::PredictorIdentity;
use crate::domain::station::Station;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightShapeError {
    #[error("因子数 {predictors} 与权重数 {weights} 不一致")]
    WeightCount { predictors: usize, weights: usize },

    #[error("因子数 {predictors} 与因子值数 {values} 不一致")]
    ValueCount { predictors: usize, values: usize },

    #[error("权重为 NaN: {0}")]
    NanWeight(String),
}

/// 训练时段信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBounds {
    pub period_id: i32,
    pub start: NaiveDate,
    pub stop: NaiveDate,
}

// ==========================================
// PredictorSet - 因子集
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSet {
    predictors: Vec<PredictorIdentity>,
    weights: Vec<f64>,
    values: Vec<f64>,

    pub period: PeriodBounds,
    pub step: i32,
    pub label: String,
}

impl PredictorSet {
    /// 由权重构造（values 尚未解析）
    pub fn new(
        predictors: Vec<PredictorIdentity>,
        weights: Vec<f64>,
        period: PeriodBounds,
        step: i32,
        label: impl Into<String>,
    ) -> Result<Self, WeightShapeError> {
        if predictors.len() != weights.len() {
            return Err(WeightShapeError::WeightCount {
                predictors: predictors.len(),
                weights: weights.len(),
            });
        }
        if let Some(i) = weights.iter().position(|w| w.is_nan()) {
            return Err(WeightShapeError::NanWeight(predictors[i].to_string()));
        }

        Ok(Self {
            predictors,
            weights,
            values: Vec::new(),
            period,
            step,
            label: label.into(),
        })
    }

    pub fn predictors(&self) -> &[PredictorIdentity] {
        &self.predictors
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.predictors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictors.is_empty()
    }

    pub fn is_resolved(&self) -> bool {
        self.values.len() == self.predictors.len()
    }

    /// 按因子标识查权重
    pub fn weight_of(&self, predictor: &PredictorIdentity) -> Option<f64> {
        self.predictors
            .iter()
            .position(|p| p == predictor)
            .map(|i| self.weights[i])
    }

    /// 替换单个权重（季节过渡 / 缺测置零）
    pub fn set_weight(&mut self, index: usize, weight: f64) {
        self.weights[index] = weight;
    }

    /// 填充因子值
    pub fn set_values(&mut self, values: Vec<f64>) -> Result<(), WeightShapeError> {
        if values.len() != self.predictors.len() {
            return Err(WeightShapeError::ValueCount {
                predictors: self.predictors.len(),
                values: values.len(),
            });
        }
        self.values = values;
        Ok(())
    }

    /// 预报值 = Σ weight[i] * value[i]
    ///
    /// 空向量结果为 0
    pub fn prediction(&self) -> Result<f64, WeightShapeError> {
        if !self.is_resolved() {
            return Err(WeightShapeError::ValueCount {
                predictors: self.predictors.len(),
                values: self.values.len(),
            });
        }
        Ok(self
            .weights
            .iter()
            .zip(self.values.iter())
            .map(|(w, v)| w * v)
            .sum())
    }
}

/// 权重表: 站点 → 因子集（按网络站号有序）
pub type WeightTable = BTreeMap<Station, PredictorSet>;
