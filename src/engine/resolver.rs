// ==========================================
// MOS 统计订正系统 - 因子值解析器
// ==========================================
// 职责: 预报因子标识 + 时效 → 站点数值
// 规则顺序:
// 1. 截距恒为 1；太阳赤纬解析计算
// 2. 已知缺口 → Gap（不查场）
// 3. 参数/层次别名 → 时效调整 → 起报时间调整 → 日平均气温时效替代
// 4. 查场（带缓存），候选场按优先级取第一个非缺测值
// 5. 累积量差分，辐射量换算为平均功率
// 6. 单位换算
// 缓存: 每个解析器实例独占（每个工作线程一个），键为生效后的完整场请求
// 红线: 场数据错误不重试，直接向上传播
// ==========================================

use crate::domain::{InterpolationMethod, PredictorIdentity, RunContext, Station, StepScheme};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::rules::{self, Accumulation};
use crate::engine::solar;
use crate::field::{FieldError, FieldHandle, FieldProvider, FieldRequest};
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info};

/// 解析结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedValue {
    Value(f64),
    /// 场中该站点缺测
    Missing,
    /// 已知的模式输出缺口，贡献为零
    Gap,
}

/// 场缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    param_name: String,
    level_name: String,
    level_value_bits: u64,
    step: i32,
    origin_time: NaiveDateTime,
    producer_id: i64,
    interpolation: InterpolationMethod,
}

impl From<&FieldRequest> for FieldKey {
    fn from(r: &FieldRequest) -> Self {
        Self {
            param_name: r.param_name.clone(),
            level_name: r.level_name.clone(),
            level_value_bits: r.level_value.to_bits(),
            step: r.step,
            origin_time: r.origin_time,
            producer_id: r.producer_id,
            interpolation: r.interpolation,
        }
    }
}

// ==========================================
// ValueResolver - 因子值解析器
// ==========================================
pub struct ValueResolver<P> {
    provider: P,
    scheme: StepScheme,
    cache: HashMap<FieldKey, Vec<FieldHandle>>,
    fetches: usize,
}

impl<P: FieldProvider> ValueResolver<P> {
    pub fn new(provider: P, scheme: StepScheme) -> Self {
        Self {
            provider,
            scheme,
            cache: HashMap::new(),
            fetches: 0,
        }
    }

    /// 累计查场次数（缓存未命中次数）
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// 生效后的场请求
    ///
    /// 完成别名映射、时效调整、起报时间调整与日平均气温时效替代
    pub fn field_request(
        &self,
        ctx: &RunContext,
        predictor: &PredictorIdentity,
        step: i32,
    ) -> EngineResult<FieldRequest> {
        let alias = rules::remap(predictor.param_name(), predictor.level_name());
        let mut step = step;

        if predictor.step_adjustment() < 0 {
            let unit = self
                .scheme
                .unit_at(step, rules::has_hourly_output(&alias.param_name));
            step += unit * predictor.step_adjustment();

            if step < 0 {
                return Err(EngineError::InvalidStep(format!(
                    "因子 {} 在时效 {} 引用了分析时刻之前的数据",
                    predictor,
                    step - unit * predictor.step_adjustment()
                )));
            }
        }

        let mut origin_time = ctx.origin_time;
        if predictor.origin_time_adjustment() == -1 {
            origin_time -= Duration::hours(12);
            step += 12;

            if alias.param_name == rules::MEAN_TEMPERATURE_PARAM {
                if let Some(snapped) = rules::snap_mean_temperature_step(step) {
                    info!(predictor = %predictor, from = step, to = snapped, "日平均气温时效替代");
                    step = snapped;
                }
            }
        }

        Ok(FieldRequest {
            param_name: alias.param_name,
            level_name: alias.level_name,
            level_value: predictor.level_value(),
            step,
            origin_time,
            producer_id: alias.producer_id.unwrap_or(ctx.producer_id),
            interpolation: rules::interpolation_method(predictor.param_name()),
        })
    }

    /// 解析单个因子在站点的数值
    pub fn resolve(
        &mut self,
        ctx: &RunContext,
        station: &Station,
        predictor: &PredictorIdentity,
        step: i32,
    ) -> EngineResult<ResolvedValue> {
        if predictor.is_intercept() {
            return Ok(ResolvedValue::Value(1.0));
        }
        if predictor.is_declination() {
            return Ok(ResolvedValue::Value(solar::declination(ctx.origin_time, step)));
        }
        if rules::is_structural_gap(predictor.param_name(), step) {
            debug!(predictor = %predictor, step, "已知缺口");
            return Ok(ResolvedValue::Gap);
        }

        let accumulation = rules::accumulation(predictor.param_name());

        // 分析时刻的累积量为 0
        if accumulation != Accumulation::None && step <= 0 {
            return Ok(ResolvedValue::Value(0.0));
        }

        let Some(mut value) = self.fetch_value(ctx, station, predictor, step)? else {
            return Ok(ResolvedValue::Missing);
        };

        if accumulation != Accumulation::None {
            let prev_step = self.scheme.previous_step(step);
            let prev_value = if prev_step == 0 {
                0.0
            } else {
                match self.fetch_value(ctx, station, predictor, prev_step)? {
                    Some(v) => v,
                    None => return Ok(ResolvedValue::Missing),
                }
            };

            value -= prev_value;

            if accumulation == Accumulation::Radiative {
                value /= ((step - prev_step) * 3600) as f64;
            }
        }

        Ok(ResolvedValue::Value(value * rules::scale_factor(predictor.param_name())))
    }

    /// 查场并在站点位置插值（None 表示全部候选场缺测）
    fn fetch_value(
        &mut self,
        ctx: &RunContext,
        station: &Station,
        predictor: &PredictorIdentity,
        step: i32,
    ) -> EngineResult<Option<f64>> {
        let request = self.field_request(ctx, predictor, step)?;
        let fields = self.fields(&request)?;

        for field in fields {
            match field.value_at(station.latitude, station.longitude) {
                Some(v) if v.is_nan() => {
                    return Err(EngineError::NumericInvariant(format!(
                        "场插值结果为 NaN: {} station={}",
                        request, station.network_station_id
                    )));
                }
                Some(v) => return Ok(Some(v)),
                None => continue, // 尝试下一个几何
            }
        }

        Ok(None)
    }

    fn fields(&mut self, request: &FieldRequest) -> EngineResult<&[FieldHandle]> {
        let key = FieldKey::from(request);

        if !self.cache.contains_key(&key) {
            debug!(request = %request, "缓存未命中，查场");
            let fields = self.provider.resolve(request)?;
            self.fetches += 1;

            if fields.is_empty() {
                return Err(FieldError::NoData(Box::new(request.clone())).into());
            }
            self.cache.insert(key.clone(), fields);
        }

        Ok(self.cache.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }
}
