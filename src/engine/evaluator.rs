// ==========================================
// MOS 统计订正系统 - 站点订正计算
// ==========================================
// 流程 (单参数单时效):
// 1. 读取当前时段权重表（空表 → NoDataForStep，非致命）
// 2. 可选: 读取相邻时段权重并做季节过渡
// 3. 逐站逐因子解析因子值，按缺测策略处理
// 4. 预报值 = Σ 权重 × 因子值
// ==========================================

use crate::config::EvaluationConfig;
use crate::domain::{
    adjacent_period, seasonal_position, MissingValuePolicy, PredictorIdentity, RunContext, Station,
    StationForecast, WeightTable,
};
use crate::engine::blender;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::resolver::{ResolvedValue, ValueResolver};
use crate::field::FieldProvider;
use crate::repository::WeightRepository;
use tracing::{debug, info, instrument, warn};

// ==========================================
// Evaluator - 订正计算器
// ==========================================
/// 每个工作线程持有一个实例（解析器缓存不跨线程共享）
pub struct Evaluator<R, P> {
    repo: R,
    resolver: ValueResolver<P>,
    config: EvaluationConfig,
}

impl<R: WeightRepository, P: FieldProvider> Evaluator<R, P> {
    pub fn new(repo: R, provider: P, config: EvaluationConfig) -> Self {
        let resolver = ValueResolver::new(provider, config.step_scheme);
        Self {
            repo,
            resolver,
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn resolver(&self) -> &ValueResolver<P> {
        &self.resolver
    }

    /// 计算单个目标参数在单个时效的全部站点预报
    ///
    /// # 错误
    /// - NoDataForStep / StepSkipped: 非致命，调用方继续下一时效
    /// - 其他: 致命
    #[instrument(skip(self, ctx), fields(label = %ctx.label, origin = %ctx.origin_time))]
    pub fn evaluate(&mut self, ctx: &RunContext, target_param: &str, step: i32) -> EngineResult<Vec<StationForecast>> {
        let mut table = self.repo.weight_table(ctx, target_param, step, None)?;

        if table.is_empty() {
            return Err(EngineError::NoDataForStep {
                param: target_param.to_string(),
                step,
            });
        }

        let mut blending_active = false;
        if self.config.seasonal_blend {
            match self.adjacent_table(ctx, target_param, step, &table)? {
                Some((adjacent, position)) => {
                    table = blender::blend(table, &adjacent, position, self.config.blend_mode)?;
                    blending_active = true;
                }
                None => {
                    warn!(param = target_param, step, "无相邻时段权重，不做季节过渡");
                }
            }
        }

        let mut results = Vec::with_capacity(table.len());

        for (station, mut set) in table {
            let predictors = set.predictors().to_vec();
            let mut values = Vec::with_capacity(predictors.len());

            for (i, predictor) in predictors.iter().enumerate() {
                let weight = set.weights()[i];

                // 截距恒为 1
                if predictor.is_intercept() {
                    values.push(1.0);
                    continue;
                }
                if weight == 0.0 && !blending_active {
                    values.push(0.0);
                    continue;
                }

                let value = match self.resolver.resolve(ctx, &station, predictor, step)? {
                    ResolvedValue::Value(v) => v,
                    ResolvedValue::Gap => 0.0,
                    ResolvedValue::Missing => match self.on_missing(&station, predictor, target_param, step)? {
                        Some(substitute) => substitute,
                        None => {
                            set.set_weight(i, 0.0);
                            0.0
                        }
                    },
                };

                values.push(value);
            }

            set.set_values(values)?;
            let value = set.prediction()?;

            if !value.is_finite() {
                return Err(EngineError::NumericInvariant(format!(
                    "预报值非有限数: station={} param={} step={} value={}",
                    station.network_station_id, target_param, step, value
                )));
            }

            debug!(station = station.network_station_id, step, param = target_param, value, "站点预报");

            results.push(StationForecast {
                station,
                step,
                value,
                predictors: set,
            });
        }

        info!(param = target_param, step, stations = results.len(), "时效计算完成");
        Ok(results)
    }

    /// 相邻时段权重表与季节位置（无可用权重时返回 None）
    fn adjacent_table(
        &self,
        ctx: &RunContext,
        target_param: &str,
        step: i32,
        table: &WeightTable,
    ) -> EngineResult<Option<(WeightTable, f64)>> {
        let Some(period) = table.values().next().map(|set| set.period.clone()) else {
            return Ok(None);
        };

        let position = seasonal_position(&period, ctx.origin_time.date()).ok_or_else(|| {
            EngineError::NumericInvariant(format!(
                "分析日期 {} 不在时段 {} ({} ~ {}) 内",
                ctx.origin_time, period.period_id, period.start, period.stop
            ))
        })?;

        let periods = self.repo.periods()?;
        let Some(adjacent) = adjacent_period(&periods, period.period_id, position) else {
            return Ok(None);
        };

        let adjacent_table = self.repo.weight_table(ctx, target_param, step, Some(adjacent.id))?;
        if adjacent_table.is_empty() {
            return Ok(None);
        }

        debug!(current = period.period_id, adjacent = adjacent.id, position, "季节过渡");
        Ok(Some((adjacent_table, position)))
    }

    /// 缺测处理
    ///
    /// # 返回
    /// - Some(v): 替代值
    /// - None: 该因子权重置零
    fn on_missing(
        &self,
        station: &Station,
        predictor: &PredictorIdentity,
        target_param: &str,
        step: i32,
    ) -> EngineResult<Option<f64>> {
        match self.config.missing_policy {
            MissingValuePolicy::Strict => Err(EngineError::MissingPredictorValue {
                station: station.network_station_id,
                predictor: predictor.to_string(),
                step,
            }),
            MissingValuePolicy::SkipStep => Err(EngineError::StepSkipped {
                param: target_param.to_string(),
                step,
                reason: format!("站点 {} 因子 {} 缺测", station.network_station_id, predictor),
            }),
            MissingValuePolicy::Graceful => match self.config.substitutes.get(predictor.param_name()) {
                Some(&substitute) => {
                    warn!(
                        station = station.network_station_id,
                        predictor = %predictor,
                        step,
                        substitute,
                        "因子缺测，使用替代值"
                    );
                    Ok(Some(substitute))
                }
                None => {
                    warn!(
                        station = station.network_station_id,
                        predictor = %predictor,
                        step,
                        "因子缺测，权重置零"
                    );
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CLOUD_BASE_SENTINEL_M;
    use crate::domain::{BlendMode, ClimatePeriod, PeriodBounds, PredictorSet, RunInfo, STANDARD_SEASONS};
    use crate::field::{FieldError, FieldHandle, FieldRequest, FieldResult, InterpolatableField};
    use crate::repository::RepositoryResult;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct ConstField(Option<f64>);

    impl InterpolatableField for ConstField {
        fn value_at(&self, _latitude: f64, _longitude: f64) -> Option<f64> {
            self.0
        }
    }

    /// 按参数名返回常数场；未登记的参数视为全部缺测
    #[derive(Default)]
    struct MockProvider {
        values: HashMap<String, f64>,
        calls: Cell<usize>,
    }

    impl MockProvider {
        fn with(mut self, param: &str, value: f64) -> Self {
            self.values.insert(param.to_string(), value);
            self
        }
    }

    impl FieldProvider for MockProvider {
        fn resolve(&self, request: &FieldRequest) -> FieldResult<Vec<FieldHandle>> {
            self.calls.set(self.calls.get() + 1);
            let value = self.values.get(&request.param_name).copied();
            Ok(vec![Arc::new(ConstField(value)) as FieldHandle])
        }

        fn latest_analysis_time(&self, _producer_id: i64, _geometry: &str) -> FieldResult<Option<NaiveDateTime>> {
            Ok(None)
        }
    }

    /// 当前时段 + 可选的相邻时段权重
    #[derive(Default)]
    struct MockRepo {
        current: Vec<(&'static str, f64)>,
        adjacent: Vec<(&'static str, f64)>,
    }

    fn origin() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn station() -> Station {
        Station::new(10, 2974, "Helsinki-Vantaa", 60.32, 24.96)
    }

    fn table(period: PeriodBounds, entries: &[(&str, f64)]) -> WeightTable {
        let predictors: Vec<PredictorIdentity> = entries.iter().map(|(k, _)| k.parse().unwrap()).collect();
        let weights = entries.iter().map(|(_, w)| *w).collect();
        let mut t = WeightTable::new();
        if !entries.is_empty() {
            t.insert(station(), PredictorSet::new(predictors, weights, period, 12, "MOS_TEST").unwrap());
        }
        t
    }

    impl WeightRepository for MockRepo {
        fn run_info(&self, label: &str) -> RepositoryResult<RunInfo> {
            Ok(RunInfo {
                version_id: 1,
                label: label.to_string(),
                producer_id: 131,
            })
        }

        fn periods(&self) -> RepositoryResult<Vec<ClimatePeriod>> {
            Ok(STANDARD_SEASONS.to_vec())
        }

        fn weight_table(
            &self,
            ctx: &RunContext,
            _target_param: &str,
            _step: i32,
            period_id: Option<i32>,
        ) -> RepositoryResult<WeightTable> {
            let date = ctx.origin_time.date();
            Ok(match period_id {
                None => table(STANDARD_SEASONS[1].containing(date).unwrap(), &self.current),
                Some(id) => {
                    let p = STANDARD_SEASONS.iter().find(|p| p.id == id).unwrap();
                    table(p.nearest(date).unwrap(), &self.adjacent)
                }
            })
        }

        fn write_trace(
            &self,
            _ctx: &RunContext,
            _target_param: &str,
            _results: &[StationForecast],
            _run_time: NaiveDateTime,
        ) -> RepositoryResult<()> {
            Ok(())
        }
    }

    fn ctx() -> RunContext {
        RunContext::new(
            RunInfo {
                version_id: 1,
                label: "MOS_TEST".to_string(),
                producer_id: 131,
            },
            origin(),
        )
    }

    fn evaluator(repo: MockRepo, provider: MockProvider, policy: MissingValuePolicy) -> Evaluator<MockRepo, MockProvider> {
        let config = EvaluationConfig {
            missing_policy: policy,
            ..EvaluationConfig::default()
        };
        Evaluator::new(repo, provider, config)
    }

    fn repo(current: &[(&'static str, f64)]) -> MockRepo {
        MockRepo {
            current: current.to_vec(),
            adjacent: vec![],
        }
    }

    #[test]
    fn test_dot_product_with_intercept() {
        let mut e = evaluator(
            repo(&[("T-K/GROUND/0", 0.5), ("TD-K/GROUND/0", 0.3), ("INTERCEPT-N/NOLEVEL/0", 0.2)]),
            MockProvider::default().with("T-K", 10.0).with("TD-K", 20.0),
            MissingValuePolicy::Graceful,
        );

        let results = e.evaluate(&ctx(), "T-K", 12).unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].value - 11.2).abs() < 1e-12);
        assert_eq!(results[0].predictors.values(), &[10.0, 20.0, 1.0]);
        assert_eq!(results[0].step, 12);
    }

    #[test]
    fn test_cloud_base_substitute() {
        let mut e = evaluator(
            repo(&[("CLDBASE-M/GROUND/0", 0.001)]),
            MockProvider::default(),
            MissingValuePolicy::Graceful,
        );

        let results = e.evaluate(&ctx(), "T-K", 12).unwrap();
        assert_eq!(results[0].predictors.values(), &[CLOUD_BASE_SENTINEL_M]);
        assert!((results[0].value - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_graceful_zeroes_missing_weight() {
        let mut e = evaluator(
            repo(&[("T-K/GROUND/0", 0.5), ("RH-PRCNT/GROUND/0", 0.7)]),
            MockProvider::default().with("T-K", 10.0),
            MissingValuePolicy::Graceful,
        );

        let results = e.evaluate(&ctx(), "T-K", 12).unwrap();
        assert_eq!(results[0].predictors.weights(), &[0.5, 0.0]);
        assert_eq!(results[0].value, 5.0);
    }

    #[test]
    fn test_strict_aborts() {
        let mut e = evaluator(
            repo(&[("T-K/GROUND/0", 0.5), ("RH-PRCNT/GROUND/0", 0.7)]),
            MockProvider::default().with("T-K", 10.0),
            MissingValuePolicy::Strict,
        );

        let err = e.evaluate(&ctx(), "T-K", 12).unwrap_err();
        assert!(err.is_fatal());
        match err {
            EngineError::MissingPredictorValue { station, predictor, step } => {
                assert_eq!(station, 2974);
                assert_eq!(predictor, "RH-PRCNT/GROUND/0/0/0");
                assert_eq!(step, 12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_skip_step_is_not_fatal() {
        let mut e = evaluator(
            repo(&[("RH-PRCNT/GROUND/0", 0.7)]),
            MockProvider::default(),
            MissingValuePolicy::SkipStep,
        );

        let err = e.evaluate(&ctx(), "T-K", 12).unwrap_err();
        assert!(matches!(err, EngineError::StepSkipped { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_empty_table_is_no_data() {
        let mut e = evaluator(repo(&[]), MockProvider::default(), MissingValuePolicy::Strict);
        let err = e.evaluate(&ctx(), "T-K", 12).unwrap_err();
        assert!(matches!(err, EngineError::NoDataForStep { step: 12, .. }));
    }

    #[test]
    fn test_zero_weight_skips_lookup() {
        let mut e = evaluator(
            repo(&[("T-K/GROUND/0", 0.0), ("INTERCEPT-N/NOLEVEL/0", 2.0)]),
            MockProvider::default(),
            MissingValuePolicy::Strict,
        );

        let results = e.evaluate(&ctx(), "T-K", 12).unwrap();
        assert_eq!(results[0].value, 2.0);
        assert_eq!(e.resolver().provider().calls.get(), 0);
    }

    #[test]
    fn test_gap_contributes_zero_even_when_strict() {
        let mut e = evaluator(
            repo(&[("T-MEAN-K/GROUND/0", 0.4), ("T-K/GROUND/0", 1.0)]),
            MockProvider::default().with("T-K", 3.0),
            MissingValuePolicy::Strict,
        );

        let results = e.evaluate(&ctx(), "T-K", 12).unwrap();
        assert_eq!(results[0].value, 3.0);
    }

    #[test]
    fn test_seasonal_blend_mixes_adjacent_period() {
        // 2024-04-15 位于春季 (03-01 ~ 05-31) 前半段 → 相邻时段为冬季
        let repo = MockRepo {
            current: vec![("T-K/GROUND/0", 1.0)],
            adjacent: vec![("T-K/GROUND/0", 3.0)],
        };
        let config = EvaluationConfig {
            seasonal_blend: true,
            blend_mode: BlendMode::Mix,
            ..EvaluationConfig::default()
        };
        let mut e = Evaluator::new(repo, MockProvider::default().with("T-K", 1.0), config);

        let results = e.evaluate(&ctx(), "T-K", 12).unwrap();
        let w = results[0].predictors.weights()[0];

        let period = STANDARD_SEASONS[1].containing(origin().date()).unwrap();
        let f = blender::blend_factor(seasonal_position(&period, origin().date()).unwrap());
        assert!((w - (f * 1.0 + (1.0 - f) * 3.0)).abs() < 1e-12);
        assert!(w > 1.0 && w < 3.0);
    }

    #[test]
    fn test_seasonal_blend_without_adjacent_weights() {
        let config = EvaluationConfig {
            seasonal_blend: true,
            ..EvaluationConfig::default()
        };
        let mut e = Evaluator::new(
            repo(&[("T-K/GROUND/0", 1.0)]),
            MockProvider::default().with("T-K", 4.0),
            config,
        );

        let results = e.evaluate(&ctx(), "T-K", 12).unwrap();
        assert_eq!(results[0].value, 4.0);
    }

    #[test]
    fn test_field_errors_are_fatal() {
        struct FailingProvider;

        impl FieldProvider for FailingProvider {
            fn resolve(&self, request: &FieldRequest) -> FieldResult<Vec<FieldHandle>> {
                Err(FieldError::NoData(Box::new(request.clone())))
            }

            fn latest_analysis_time(&self, _producer_id: i64, _geometry: &str) -> FieldResult<Option<NaiveDateTime>> {
                Ok(None)
            }
        }

        let mut e = Evaluator::new(repo(&[("T-K/GROUND/0", 1.0)]), FailingProvider, EvaluationConfig::default());
        let err = e.evaluate(&ctx(), "T-K", 12).unwrap_err();
        assert!(matches!(err, EngineError::Field(_)));
        assert!(err.is_fatal());
    }
}
