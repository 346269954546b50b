// ==========================================
// MOS 统计订正系统 - 工作线程调度
// ==========================================
// 固定数量的 OS 线程，全部同步阻塞执行
// 每个线程:
// - 持有运行上下文副本、独立的权重仓储与场提供者（各占一个连接池句柄）
// - 循环领取时效，对每个目标参数执行订正计算并写出结果
// 错误处理:
// - 非致命（无权重 / 跳过时效）→ warn，继续
// - 致命 → 置中止标志，其他线程不再领取新时效，运行返回该错误
// - 审计轨迹写入失败只记录 warn，不影响已产生的结果
// ==========================================

use crate::config::EvaluationConfig;
use crate::domain::RunContext;
use crate::engine::distributor::WorkDistributor;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::evaluator::Evaluator;
use crate::field::FieldProvider;
use crate::output::ResultWriter;
use crate::repository::WeightRepository;
use chrono::{Local, NaiveDateTime};
use std::ops::AddAssign;
use tracing::{error, info, info_span, warn};

/// 运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 已处理的时效数
    pub steps: usize,
    /// 已写出的结果文件数
    pub files: usize,
    /// 站点预报条数
    pub forecasts: usize,
    /// 因无权重或缺测策略而跳过的 (参数, 时效)
    pub skipped: usize,
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.steps += other.steps;
        self.files += other.files;
        self.forecasts += other.forecasts;
        self.skipped += other.skipped;
    }
}

/// 启动工作线程并等待全部结束
///
/// # 参数
/// - open_repo / open_provider: 每个线程调用一次，通常从连接池取句柄
#[allow(clippy::too_many_arguments)]
pub fn run_workers<R, P, FR, FP, W>(
    threads: usize,
    distributor: &WorkDistributor,
    ctx: &RunContext,
    target_params: &[String],
    config: &EvaluationConfig,
    open_repo: &FR,
    open_provider: &FP,
    writer: &W,
) -> EngineResult<RunSummary>
where
    R: WeightRepository,
    P: FieldProvider,
    FR: Fn() -> EngineResult<R> + Sync,
    FP: Fn() -> EngineResult<P> + Sync,
    W: ResultWriter + ?Sized,
{
    let threads = threads.max(1);
    let run_time = Local::now().naive_local();

    info!(threads, run_id = %ctx.run_id, params = ?target_params, "启动工作线程");

    let outcomes: Vec<EngineResult<RunSummary>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|index| {
                s.spawn(move || {
                    let _span = info_span!("worker", index).entered();
                    let outcome = work(
                        distributor,
                        ctx.clone(),
                        target_params,
                        config,
                        open_repo,
                        open_provider,
                        writer,
                        run_time,
                    );
                    if outcome.is_err() {
                        distributor.abort();
                    }
                    outcome
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| {
                handle.join().unwrap_or_else(|_| {
                    distributor.abort();
                    Err(EngineError::WorkerPanic(index))
                })
            })
            .collect()
    });

    let mut summary = RunSummary::default();
    let mut first_error = None;

    for outcome in outcomes {
        match outcome {
            Ok(s) => summary += s,
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    info!(
        steps = summary.steps,
        files = summary.files,
        forecasts = summary.forecasts,
        skipped = summary.skipped,
        "全部时效计算完成"
    );
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn work<R, P, FR, FP, W>(
    distributor: &WorkDistributor,
    ctx: RunContext,
    target_params: &[String],
    config: &EvaluationConfig,
    open_repo: &FR,
    open_provider: &FP,
    writer: &W,
    run_time: NaiveDateTime,
) -> EngineResult<RunSummary>
where
    R: WeightRepository,
    P: FieldProvider,
    FR: Fn() -> EngineResult<R>,
    FP: Fn() -> EngineResult<P>,
    W: ResultWriter + ?Sized,
{
    let mut evaluator = Evaluator::new(open_repo()?, open_provider()?, config.clone());
    let mut summary = RunSummary::default();

    while let Some(step) = distributor.next_step() {
        for param in target_params {
            if distributor.is_aborted() {
                return Ok(summary);
            }

            match evaluator.evaluate(&ctx, param, step) {
                Ok(results) => {
                    writer.write(&ctx, param, step, &results)?;
                    summary.files += 1;
                    summary.forecasts += results.len();

                    if ctx.trace_output {
                        if let Err(e) = evaluator.repository().write_trace(&ctx, param, &results, run_time) {
                            warn!(param = %param, step, error = %e, "审计轨迹写入失败");
                        }
                    }
                }
                Err(e) if !e.is_fatal() => {
                    warn!(param = %param, step, reason = %e, "跳过");
                    summary.skipped += 1;
                }
                Err(e) => {
                    error!(param = %param, step, error = %e, "致命错误，终止运行");
                    return Err(e);
                }
            }
        }
        summary.steps += 1;
    }

    info!(
        steps = summary.steps,
        fetches = evaluator.resolver().fetch_count(),
        "工作线程结束"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ClimatePeriod, PredictorIdentity, PredictorSet, RunInfo, Station, StationForecast, WeightTable,
        STANDARD_SEASONS,
    };
    use crate::field::{FieldError, FieldHandle, FieldRequest, FieldResult, InterpolatableField};
    use crate::output::OutputResult;
    use crate::repository::{RepositoryError, RepositoryResult};
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct ConstField(f64);

    impl InterpolatableField for ConstField {
        fn value_at(&self, _latitude: f64, _longitude: f64) -> Option<f64> {
            Some(self.0)
        }
    }

    /// 场值 = 时效；step 为 fail_at 时返回错误
    struct StepProvider {
        fail_at: Option<i32>,
    }

    impl FieldProvider for StepProvider {
        fn resolve(&self, request: &FieldRequest) -> FieldResult<Vec<FieldHandle>> {
            if Some(request.step) == self.fail_at {
                return Err(FieldError::NoData(Box::new(request.clone())));
            }
            Ok(vec![Arc::new(ConstField(request.step as f64)) as FieldHandle])
        }

        fn latest_analysis_time(&self, _producer_id: i64, _geometry: &str) -> FieldResult<Option<NaiveDateTime>> {
            Ok(None)
        }
    }

    /// 只有 T-K 有权重
    struct Repo {
        traces: Arc<AtomicUsize>,
        trace_fails: bool,
    }

    impl WeightRepository for Repo {
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
            target_param: &str,
            step: i32,
            _period_id: Option<i32>,
        ) -> RepositoryResult<WeightTable> {
            let mut table = WeightTable::new();
            if target_param == "T-K" {
                let period = STANDARD_SEASONS[0].containing(ctx.origin_time.date()).unwrap();
                let predictors: Vec<PredictorIdentity> = vec!["T-K/GROUND/0".parse().unwrap()];
                table.insert(
                    Station::new(10, 2974, "Helsinki-Vantaa", 60.32, 24.96),
                    PredictorSet::new(predictors, vec![2.0], period, step, "MOS_TEST").unwrap(),
                );
            }
            Ok(table)
        }

        fn write_trace(
            &self,
            _ctx: &RunContext,
            _target_param: &str,
            _results: &[StationForecast],
            _run_time: NaiveDateTime,
        ) -> RepositoryResult<()> {
            if self.trace_fails {
                return Err(RepositoryError::DatabaseQueryError("database is locked".to_string()));
            }
            self.traces.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingWriter {
        written: Mutex<Vec<(String, i32, f64)>>,
    }

    impl ResultWriter for CollectingWriter {
        fn write(
            &self,
            _ctx: &RunContext,
            target_param: &str,
            step: i32,
            results: &[StationForecast],
        ) -> OutputResult<PathBuf> {
            let mut written = self.written.lock().unwrap();
            for r in results {
                written.push((target_param.to_string(), step, r.value));
            }
            Ok(PathBuf::from(format!("mos_{}_{}.csv", target_param, step)))
        }
    }

    fn ctx(trace: bool) -> RunContext {
        let origin = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut ctx = RunContext::new(
            RunInfo {
                version_id: 1,
                label: "MOS_TEST".to_string(),
                producer_id: 131,
            },
            origin,
        );
        ctx.trace_output = trace;
        ctx
    }

    fn params() -> Vec<String> {
        vec!["T-K".to_string(), "TD-K".to_string()]
    }

    #[test]
    fn test_all_steps_evaluated_once() {
        crate::logging::init_test();
        let traces = Arc::new(AtomicUsize::new(0));
        let writer = CollectingWriter::default();
        let distributor = WorkDistributor::new(3, 9, 3);

        let summary = run_workers(
            3,
            &distributor,
            &ctx(true),
            &params(),
            &EvaluationConfig::default(),
            &|| {
                Ok(Repo {
                    traces: traces.clone(),
                    trace_fails: false,
                })
            },
            &|| Ok(StepProvider { fail_at: None }),
            &writer,
        )
        .unwrap();

        assert_eq!(summary.steps, 3);
        assert_eq!(summary.files, 3);
        assert_eq!(summary.forecasts, 3);
        assert_eq!(summary.skipped, 3); // TD-K 无权重
        assert_eq!(traces.load(Ordering::SeqCst), 3);

        let mut written = writer.written.into_inner().unwrap();
        written.sort_by_key(|(_, step, _)| *step);
        assert_eq!(
            written,
            vec![
                ("T-K".to_string(), 3, 6.0),
                ("T-K".to_string(), 6, 12.0),
                ("T-K".to_string(), 9, 18.0)
            ]
        );
    }

    #[test]
    fn test_trace_failure_is_not_fatal() {
        let writer = CollectingWriter::default();
        let distributor = WorkDistributor::new(3, 6, 3);

        let summary = run_workers(
            2,
            &distributor,
            &ctx(true),
            &params(),
            &EvaluationConfig::default(),
            &|| {
                Ok(Repo {
                    traces: Arc::new(AtomicUsize::new(0)),
                    trace_fails: true,
                })
            },
            &|| Ok(StepProvider { fail_at: None }),
            &writer,
        )
        .unwrap();

        assert_eq!(summary.files, 2);
    }

    #[test]
    fn test_fatal_error_aborts_run() {
        let writer = CollectingWriter::default();
        let distributor = WorkDistributor::new(0, 120, 3);

        let err = run_workers(
            2,
            &distributor,
            &ctx(false),
            &params(),
            &EvaluationConfig::default(),
            &|| {
                Ok(Repo {
                    traces: Arc::new(AtomicUsize::new(0)),
                    trace_fails: false,
                })
            },
            &|| Ok(StepProvider { fail_at: Some(6) }),
            &writer,
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::Field(_)));
        assert!(distributor.is_aborted());
        assert!(writer.written.lock().unwrap().len() < 41);
    }

    #[test]
    fn test_worker_setup_failure_is_fatal() {
        let writer = CollectingWriter::default();
        let distributor = WorkDistributor::new(3, 9, 3);

        let err = run_workers(
            2,
            &distributor,
            &ctx(false),
            &params(),
            &EvaluationConfig::default(),
            &|| -> EngineResult<Repo> { Err(EngineError::Pool("连接创建失败".to_string())) },
            &|| Ok(StepProvider { fail_at: None }),
            &writer,
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::Pool(_)));
        assert!(writer.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_worker_reported() {
        let writer = CollectingWriter::default();
        let distributor = WorkDistributor::new(3, 9, 3);

        let err = run_workers(
            1,
            &distributor,
            &ctx(false),
            &params(),
            &EvaluationConfig::default(),
            &|| -> EngineResult<Repo> { panic!("boom") },
            &|| Ok(StepProvider { fail_at: None }),
            &writer,
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::WorkerPanic(0)));
    }
}
