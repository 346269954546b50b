// ==========================================
// MOS 统计订正系统 - 权重仓储
// ==========================================
// 职责: 读取 MOS 版本信息、训练时段、站点回归权重；写入审计轨迹
// 红线: Repository 不含业务逻辑（不做因子解析、不做季节过渡）
// 存储: 权重以 JSON 对象保存，键为因子标识字符串
// ==========================================

use crate::domain::{
    find_period, ClimatePeriod, PeriodBounds, PredictorIdentity, PredictorSet, RunContext, RunInfo,
    Station, StationForecast, WeightTable,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::ops::Deref;
use tracing::{debug, info};

/// 审计轨迹时间格式
pub const TRACE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// WeightRepository Trait
// ==========================================
/// 权重仓储接口
///
/// 数据库实现与权重文件实现共用此接口，引擎只依赖 trait
pub trait WeightRepository {
    /// 按标签读取 MOS 版本信息；标签不存在返回 NotFound
    fn run_info(&self, label: &str) -> RepositoryResult<RunInfo>;

    /// 全部训练时段
    fn periods(&self) -> RepositoryResult<Vec<ClimatePeriod>>;

    /// 读取权重表
    ///
    /// # 参数
    /// - period_id: None 表示分析日期所在时段
    ///
    /// # 返回
    /// - 无匹配记录时返回空表，不视为错误
    fn weight_table(
        &self,
        ctx: &RunContext,
        target_param: &str,
        step: i32,
        period_id: Option<i32>,
    ) -> RepositoryResult<WeightTable>;

    /// 写入审计轨迹
    fn write_trace(
        &self,
        ctx: &RunContext,
        target_param: &str,
        results: &[StationForecast],
        run_time: NaiveDateTime,
    ) -> RepositoryResult<()>;
}

impl<T: WeightRepository + ?Sized> WeightRepository for &T {
    fn run_info(&self, label: &str) -> RepositoryResult<RunInfo> {
        (**self).run_info(label)
    }

    fn periods(&self) -> RepositoryResult<Vec<ClimatePeriod>> {
        (**self).periods()
    }

    fn weight_table(
        &self,
        ctx: &RunContext,
        target_param: &str,
        step: i32,
        period_id: Option<i32>,
    ) -> RepositoryResult<WeightTable> {
        (**self).weight_table(ctx, target_param, step, period_id)
    }

    fn write_trace(
        &self,
        ctx: &RunContext,
        target_param: &str,
        results: &[StationForecast],
        run_time: NaiveDateTime,
    ) -> RepositoryResult<()> {
        (**self).write_trace(ctx, target_param, results, run_time)
    }
}

/// 按时段 id 与分析日期确定时段区间
///
/// 当前时段取包含分析日期的区间；其他时段取起始日最接近分析日期的区间
pub fn resolve_period_bounds(
    periods: &[ClimatePeriod],
    origin_time: NaiveDateTime,
    period_id: Option<i32>,
) -> Option<PeriodBounds> {
    let date = origin_time.date();
    match period_id {
        None => find_period(periods, date),
        Some(id) => {
            let period = periods.iter().find(|p| p.id == id)?;
            period.containing(date).or_else(|| period.nearest(date))
        }
    }
}

/// 由 JSON 对象构造因子集
///
/// 因子列表按键排序，与审计轨迹中的顺序一致
pub fn parse_weight_json(
    raw: &str,
    period: PeriodBounds,
    step: i32,
    label: &str,
) -> RepositoryResult<PredictorSet> {
    let map: BTreeMap<String, f64> = serde_json::from_str(raw)?;

    let mut predictors = Vec::with_capacity(map.len());
    let mut weights = Vec::with_capacity(map.len());
    for (key, weight) in map {
        predictors.push(key.parse::<PredictorIdentity>()?);
        weights.push(weight);
    }

    Ok(PredictorSet::new(predictors, weights, period, step, label)?)
}

/// 因子标识 → 数值 的 JSON 对象（审计轨迹）
fn to_json_object(predictors: &[PredictorIdentity], values: &[f64]) -> RepositoryResult<String> {
    let map: serde_json::Map<String, serde_json::Value> = predictors
        .iter()
        .zip(values.iter())
        .map(|(p, v)| (p.to_string(), serde_json::json!(v)))
        .collect();
    Ok(serde_json::to_string(&map)?)
}

// ==========================================
// SqliteWeightRepository - 数据库权重仓储
// ==========================================
/// C 可以是独占的 Connection，也可以是连接池句柄
pub struct SqliteWeightRepository<C> {
    conn: C,
}

impl<C: Deref<Target = Connection>> SqliteWeightRepository<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// 按名称查 param.id
    pub fn param_id(&self, name: &str) -> RepositoryResult<Option<i64>> {
        let id = self
            .conn
            .query_row("SELECT id FROM param WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// 按名称查 level.id
    pub fn level_id(&self, name: &str) -> RepositoryResult<Option<i64>> {
        let id = self
            .conn
            .query_row("SELECT id FROM level WHERE name = ?1", params![name], |row| row.get(0))
            .optional()?;
        Ok(id)
    }
}

impl<C: Deref<Target = Connection>> WeightRepository for SqliteWeightRepository<C> {
    fn run_info(&self, label: &str) -> RepositoryResult<RunInfo> {
        let result = self.conn.query_row(
            "SELECT id, label, producer_id FROM mos_version WHERE label = ?1",
            params![label],
            |row| {
                Ok(RunInfo {
                    version_id: row.get(0)?,
                    label: row.get(1)?,
                    producer_id: row.get(2)?,
                })
            },
        );

        match result {
            Ok(info) => Ok(info),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(RepositoryError::NotFound {
                entity: "mos_version".to_string(),
                id: label.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn periods(&self) -> RepositoryResult<Vec<ClimatePeriod>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_month, start_day, stop_month, stop_day FROM mos_period ORDER BY id",
        )?;

        let periods = stmt
            .query_map([], |row| {
                Ok(ClimatePeriod::new(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(periods)
    }

    fn weight_table(
        &self,
        ctx: &RunContext,
        target_param: &str,
        step: i32,
        period_id: Option<i32>,
    ) -> RepositoryResult<WeightTable> {
        let periods = self.periods()?;
        let mut table = WeightTable::new();

        let Some(bounds) = resolve_period_bounds(&periods, ctx.origin_time, period_id) else {
            debug!(label = %ctx.label, ?period_id, origin = %ctx.origin_time, "分析日期无对应训练时段");
            return Ok(table);
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.id, snm.local_station_id, s.name, s.latitude, s.longitude, f.weights
            FROM mos_weight f
            JOIN param p ON p.id = f.target_param_id
            JOIN station s ON s.id = f.station_id
            JOIN station_network_mapping snm ON snm.station_id = s.id AND snm.network_id = ?1
            WHERE f.mos_version_id = ?2
              AND f.mos_period_id = ?3
              AND p.name = ?4
              AND f.analysis_hour = ?5
              AND f.forecast_hours = ?6
            ORDER BY snm.local_station_id
            "#,
        )?;

        let rows = stmt
            .query_map(
                params![
                    ctx.network_id,
                    ctx.version_id,
                    bounds.period_id,
                    target_param,
                    ctx.analysis_hour(),
                    step
                ],
                |row| {
                    Ok((
                        Station::new(row.get(0)?, row.get(1)?, row.get::<_, String>(2)?, row.get(3)?, row.get(4)?),
                        row.get::<_, String>(5)?,
                    ))
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (station, raw) in rows {
            if !ctx.accepts_station(station.network_station_id) {
                continue;
            }

            let set = parse_weight_json(&raw, bounds.clone(), step, &ctx.label)?;
            if !set.is_empty() {
                table.insert(station, set);
            }
        }

        if ctx.trace_output {
            info!(param = target_param, step, period = bounds.period_id, stations = table.len(), "读取权重");
        }

        Ok(table)
    }

    fn write_trace(
        &self,
        ctx: &RunContext,
        target_param: &str,
        results: &[StationForecast],
        run_time: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let param_id = self.param_id(target_param)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "param".to_string(),
            id: target_param.to_string(),
        })?;
        let level_id = self.level_id(&ctx.level_name)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "level".to_string(),
            id: ctx.level_name.clone(),
        })?;

        // 未提交的事务在连接归还时由连接池回滚
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO mos_trace (
                    run_id, mos_version_id, mos_period_id, analysis_time, station_id, forecast_hours,
                    target_param_id, target_level_id, target_level_value,
                    weights, source_values, value, run_time
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, ?12)
                "#,
            )?;

            for result in results {
                let set = &result.predictors;
                stmt.execute(params![
                    ctx.run_id.to_string(),
                    ctx.version_id,
                    set.period.period_id,
                    ctx.origin_time.format(TRACE_TIME_FORMAT).to_string(),
                    result.station.id,
                    result.step,
                    param_id,
                    level_id,
                    to_json_object(set.predictors(), set.weights())?,
                    to_json_object(set.predictors(), set.values())?,
                    result.value,
                    run_time.format(TRACE_TIME_FORMAT).to_string(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(param = target_param, rows = results.len(), "审计轨迹已写入");
        Ok(())
    }
}
