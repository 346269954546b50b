// ==========================================
// MOS 统计订正系统 - 运行上下文与计算结果
// ==========================================
// RunContext: 每次运行构造一次，之后不可变；每个工作线程持有独立副本
// 当前目标参数与时效通过调用参数显式传递，不写入共享状态
// ==========================================

use crate::domain::station::{Station, NETWORK_WMO};
use crate::domain::weight::PredictorSet;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 权重库中的 MOS 版本信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub version_id: i64,
    pub label: String,
    pub producer_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub version_id: i64,
    pub label: String,
    pub level_name: String,
    pub origin_time: NaiveDateTime,
    pub producer_id: i64,
    pub network_id: i32,
    /// 站点过滤（网络站号），空表示全部
    pub station_ids: Vec<i64>,
    pub trace_output: bool,
}

impl RunContext {
    pub fn new(info: RunInfo, origin_time: NaiveDateTime) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            version_id: info.version_id,
            label: info.label,
            level_name: "GROUND".to_string(),
            origin_time,
            producer_id: info.producer_id,
            network_id: NETWORK_WMO,
            station_ids: Vec::new(),
            trace_output: false,
        }
    }

    /// 分析时次（00 / 12）
    pub fn analysis_hour(&self) -> u32 {
        self.origin_time.hour()
    }

    pub fn accepts_station(&self, network_station_id: i64) -> bool {
        self.station_ids.is_empty() || self.station_ids.contains(&network_station_id)
    }
}

/// 单站单时效的订正结果（供写出与审计）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationForecast {
    pub station: Station,
    pub step: i32,
    pub value: f64,
    pub predictors: PredictorSet,
}
