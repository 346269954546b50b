// ==========================================
// MOS 统计订正系统 - 场数据提供者接口
// ==========================================
// 职责: 将 (参数, 层次, 层值, 时效, 起报时间, 生产者) 解析为一个或多个可插值场
// 说明: 多个候选场按优先级排列，调用方取第一个非缺测值
// ==========================================

use crate::domain::InterpolationMethod;
use crate::field::error::FieldResult;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 可在任意经纬度插值的场
pub trait InterpolatableField: Send + Sync {
    /// 站点位置的插值结果，None 表示缺测
    fn value_at(&self, latitude: f64, longitude: f64) -> Option<f64>;
}

pub type FieldHandle = Arc<dyn InterpolatableField>;

/// 场请求（已完成参数映射与时间调整）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRequest {
    pub param_name: String,
    pub level_name: String,
    pub level_value: f64,
    pub step: i32,
    pub origin_time: NaiveDateTime,
    pub producer_id: i64,
    pub interpolation: InterpolationMethod,
}

impl fmt::Display for FieldRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{} step {} origin {}",
            self.producer_id,
            self.param_name,
            self.level_name,
            self.level_value,
            self.step,
            self.origin_time.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// 场数据提供者
pub trait FieldProvider {
    /// 解析候选场列表（按优先级），无数据时返回错误
    fn resolve(&self, request: &FieldRequest) -> FieldResult<Vec<FieldHandle>>;

    /// 生产者在给定几何上的最新分析时间
    fn latest_analysis_time(&self, producer_id: i64, geometry: &str) -> FieldResult<Option<NaiveDateTime>>;
}
