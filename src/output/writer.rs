// ==========================================
// MOS 统计订正系统 - CSV 结果写出
// ==========================================
// 文件名: mos_<PARAM>_<STEP>.csv
// 列: producer_id, analysis_time, station_id, param_id, level_id, level_value,
//     forecast_period, forecast_type_id, forecast_type_value, value
// station_id 为网络站号；forecast_type 固定为确定性预报 (1 / -1)
// ==========================================

use crate::domain::{RunContext, StationForecast};
use crate::output::error::{OutputError, OutputResult};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 结果文件中的时间格式
pub const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER: [&str; 10] = [
    "producer_id",
    "analysis_time",
    "station_id",
    "param_id",
    "level_id",
    "level_value",
    "forecast_period",
    "forecast_type_id",
    "forecast_type_value",
    "value",
];

const DETERMINISTIC_FORECAST_TYPE_ID: i32 = 1;
const DETERMINISTIC_FORECAST_TYPE_VALUE: i32 = -1;

/// 结果写出接口（工作线程共享）
pub trait ResultWriter: Sync {
    /// 写出单个 (参数, 时效) 的结果，返回文件路径
    fn write(
        &self,
        ctx: &RunContext,
        target_param: &str,
        step: i32,
        results: &[StationForecast],
    ) -> OutputResult<PathBuf>;
}

pub fn result_file_name(target_param: &str, step: i32) -> String {
    format!("mos_{}_{}.csv", target_param, step)
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    producer_id: i64,
    analysis_time: &'a str,
    station_id: i64,
    param_id: i64,
    level_id: i64,
    level_value: f64,
    forecast_period: &'a str,
    forecast_type_id: i32,
    forecast_type_value: i32,
    value: f64,
}

// ==========================================
// CsvResultWriter
// ==========================================
pub struct CsvResultWriter {
    output_dir: PathBuf,
    param_ids: HashMap<String, i64>,
    level_ids: HashMap<String, i64>,
}

impl CsvResultWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        param_ids: HashMap<String, i64>,
        level_ids: HashMap<String, i64>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            param_ids,
            level_ids,
        }
    }

    /// 从 param / level 编码表构造
    pub fn from_catalog(conn: &Connection, output_dir: impl Into<PathBuf>) -> OutputResult<Self> {
        let load = |sql: &str| -> OutputResult<HashMap<String, i64>> {
            let mut stmt = conn.prepare(sql)?;
            let ids = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<rusqlite::Result<HashMap<_, _>>>()?;
            Ok(ids)
        };

        Ok(Self::new(
            output_dir,
            load("SELECT name, id FROM param")?,
            load("SELECT name, id FROM level")?,
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ResultWriter for CsvResultWriter {
    fn write(
        &self,
        ctx: &RunContext,
        target_param: &str,
        step: i32,
        results: &[StationForecast],
    ) -> OutputResult<PathBuf> {
        let param_id = *self
            .param_ids
            .get(target_param)
            .ok_or_else(|| OutputError::UnknownTargetParam(target_param.to_string()))?;
        let level_id = *self
            .level_ids
            .get(&ctx.level_name)
            .ok_or_else(|| OutputError::UnknownLevel(ctx.level_name.clone()))?;

        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(result_file_name(target_param, step));

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(&path)?;
        writer.write_record(HEADER)?;

        let analysis_time = ctx.origin_time.format(OUTPUT_TIME_FORMAT).to_string();
        let forecast_period = format!("{:02}:00:00", step);

        for result in results {
            writer.serialize(OutputRow {
                producer_id: ctx.producer_id,
                analysis_time: &analysis_time,
                station_id: result.station.network_station_id,
                param_id,
                level_id,
                level_value: 0.0,
                forecast_period: &forecast_period,
                forecast_type_id: DETERMINISTIC_FORECAST_TYPE_ID,
                forecast_type_value: DETERMINISTIC_FORECAST_TYPE_VALUE,
                value: result.value,
            })?;
        }
        writer.flush()?;

        info!(path = %path.display(), rows = results.len(), "结果文件已写出");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PeriodBounds, PredictorSet, RunInfo, Station};
    use chrono::NaiveDate;

    fn ctx() -> RunContext {
        let origin = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        RunContext::new(
            RunInfo {
                version_id: 1,
                label: "MOS_TEST".to_string(),
                producer_id: 131,
            },
            origin,
        )
    }

    fn forecast(station: Station, value: f64) -> StationForecast {
        let period = PeriodBounds {
            period_id: 1,
            start: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            stop: NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
        };
        StationForecast {
            station,
            step: 3,
            value,
            predictors: PredictorSet::new(vec![], vec![], period, 3, "MOS_TEST").unwrap(),
        }
    }

    fn writer(dir: &Path) -> CsvResultWriter {
        CsvResultWriter::new(
            dir,
            HashMap::from([("T-K".to_string(), 4)]),
            HashMap::from([("GROUND".to_string(), 5)]),
        )
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![
            forecast(Station::new(10, 2974, "Helsinki-Vantaa", 60.32, 24.96), 271.25),
            forecast(Station::new(11, 2963, "Jokioinen", 60.81, 23.5), 270.5),
        ];

        let path = writer(dir.path()).write(&ctx(), "T-K", 3, &results).unwrap();
        assert_eq!(path.file_name().unwrap(), "mos_T-K_3.csv");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(lines[1], "131,2024-01-15 12:00:00,2974,4,5,0.0,03:00:00,1,-1,271.25");
        assert_eq!(lines[2], "131,2024-01-15 12:00:00,2963,4,5,0.0,03:00:00,1,-1,270.5");
    }

    #[test]
    fn test_long_lead_time_period() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![forecast(Station::new(10, 2974, "Helsinki-Vantaa", 60.32, 24.96), 1.0)];

        let path = writer(dir.path()).write(&ctx(), "T-K", 144, &results).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains(",144:00:00,"));
    }

    #[test]
    fn test_unknown_codes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        assert!(matches!(
            w.write(&ctx(), "TD-K", 3, &[]),
            Err(OutputError::UnknownTargetParam(_))
        ));

        let mut c = ctx();
        c.level_name = "HEIGHT".to_string();
        assert!(matches!(w.write(&c, "T-K", 3, &[]), Err(OutputError::UnknownLevel(_))));
    }

    #[test]
    fn test_codes_from_catalog() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO param (id, name) VALUES (4, 'T-K');
             INSERT INTO level (id, name) VALUES (5, 'GROUND');",
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let w = CsvResultWriter::from_catalog(&conn, dir.path()).unwrap();
        let path = w.write(&ctx(), "T-K", 6, &[]).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
