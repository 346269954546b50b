// ==========================================
// MOS 统计订正系统 - 运行装配
// ==========================================
// 步骤:
// 1. 打开数据库并建表
// 2. 确定 MOS 版本（数据库）或读取权重文件
// 3. 确定分析时间（命令行 / 场目录最新）并校验时次
// 4. 加载引擎配置，构造运行上下文
// 5. 两个连接池（权重 / 场目录），容量 = 线程数 + 1
// 6. 启动工作线程
// ==========================================

use crate::config::{check_analysis_hour, ConfigManager, RunOptions};
use crate::db::{default_db_path, init_schema, open_sqlite_connection};
use crate::domain::RunContext;
use crate::engine::{run_workers, EngineError, RunSummary, WorkDistributor};
use crate::field::{FieldProvider, SqliteFieldProvider};
use crate::output::CsvResultWriter;
use crate::pool::ConnectionPool;
use crate::repository::{FileWeightRepository, SqliteWeightRepository, WeightRepository, WeightsFileFilter};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use std::time::Duration;
use tracing::info;

/// 分析时间: 命令行指定，否则取场目录中该生产者在源几何上的最新时间
pub fn resolve_origin_time<P: FieldProvider>(
    requested: Option<NaiveDateTime>,
    provider: &P,
    producer_id: i64,
    source_geometry: &str,
) -> Result<NaiveDateTime> {
    let origin = match requested {
        Some(t) => t,
        None => provider
            .latest_analysis_time(producer_id, source_geometry)?
            .ok_or_else(|| anyhow!("场目录中没有生产者 {} 在 {} 上的数据", producer_id, source_geometry))?,
    };

    check_analysis_hour(origin)?;
    Ok(origin)
}

/// 执行一次完整运行
pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    let db_path = opts.database.clone().unwrap_or_else(default_db_path);
    info!(db_path = %db_path, "使用数据库");

    let conn = open_sqlite_connection(&db_path).with_context(|| format!("无法打开数据库 {}", db_path))?;
    init_schema(&conn).context("建表失败")?;

    // 权重文件模式在确定分析时间后读取
    let (producer_id, db_info) = match opts.weights_file {
        Some(_) => (opts.producer_id, None),
        None => {
            let info = SqliteWeightRepository::new(&conn)
                .run_info(&opts.label)
                .with_context(|| format!("MOS 标签 {} 不存在", opts.label))?;
            (info.producer_id, Some(info))
        }
    };

    let origin_time = resolve_origin_time(
        opts.analysis_time,
        &SqliteFieldProvider::new(&conn),
        producer_id,
        &opts.source_geometry,
    )?;

    let file_repo = match &opts.weights_file {
        Some(path) => Some(
            FileWeightRepository::load(
                path,
                opts.label.clone(),
                producer_id,
                &WeightsFileFilter {
                    origin_time,
                    station_ids: opts.station_ids.clone(),
                    steps: opts.steps(),
                },
            )
            .with_context(|| format!("读取权重文件 {} 失败", path.display()))?,
        ),
        None => None,
    };

    let info = match (&file_repo, db_info) {
        (Some(repo), _) => repo.run_info(&opts.label)?,
        (None, Some(info)) => info,
        (None, None) => return Err(anyhow!("既没有 MOS 标签也没有权重文件")),
    };

    let config = ConfigManager::new(&conn).load_evaluation_config(&info.label, opts.missing_policy, opts.seasonal_blend)?;

    let mut ctx = RunContext::new(info, origin_time);
    ctx.network_id = opts.network_id;
    ctx.station_ids = opts.station_ids.clone();
    ctx.trace_output = opts.trace;

    info!(
        run_id = %ctx.run_id,
        label = %ctx.label,
        version = ctx.version_id,
        producer = ctx.producer_id,
        origin = %ctx.origin_time,
        policy = %config.missing_policy,
        "运行参数已确定"
    );

    let writer = CsvResultWriter::from_catalog(&conn, &opts.output_dir)?;
    let distributor = WorkDistributor::new(opts.start_step, opts.end_step, opts.step_length);

    let capacity = opts.threads + 1;
    let field_pool = sqlite_pool(capacity, &db_path, config.pool_wait);
    let open_provider = || {
        field_pool
            .acquire()
            .map(SqliteFieldProvider::new)
            .map_err(|e| EngineError::Pool(e.to_string()))
    };

    let summary = match &file_repo {
        Some(repo) => run_workers(
            opts.threads,
            &distributor,
            &ctx,
            &opts.parameters,
            &config,
            &|| Ok(repo),
            &open_provider,
            &writer,
        )?,
        None => {
            let weight_pool = sqlite_pool(capacity, &db_path, config.pool_wait);
            let open_repo = || {
                weight_pool
                    .acquire()
                    .map(SqliteWeightRepository::new)
                    .map_err(|e| EngineError::Pool(e.to_string()))
            };
            run_workers(
                opts.threads,
                &distributor,
                &ctx,
                &opts.parameters,
                &config,
                &open_repo,
                &open_provider,
                &writer,
            )?
        }
    };

    Ok(summary)
}

fn sqlite_pool(capacity: usize, db_path: &str, wait: Duration) -> ConnectionPool<Connection, rusqlite::Error> {
    let path = db_path.to_string();
    ConnectionPool::with_wait(capacity, wait, move |_| open_sqlite_connection(&path))
}
