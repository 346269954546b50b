// ==========================================
// MOS 统计订正系统 - 权重文件仓储
// ==========================================
// 文件格式 (CSV 或 gzip 压缩的 CSV，无表头，# 开头为注释):
//   period_id, analysis_hour, station_id, lon, lat, step, target_param, (predictor, weight)*
// 过滤: 分析时次 / 当前时段（标准四季）/ 站点 / 请求时效
// 说明: 权重文件模式不写审计轨迹
// ==========================================

use crate::domain::{
    find_period, ClimatePeriod, PeriodBounds, PredictorIdentity, PredictorSet, RunContext, RunInfo,
    Station, StationForecast, WeightTable, STANDARD_SEASONS,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::weight_repo::WeightRepository;
use chrono::{NaiveDateTime, Timelike};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// 固定列数（其后为 因子/权重 成对出现）
const FIXED_COLUMNS: usize = 7;

/// 文件读取过滤条件
#[derive(Debug, Clone)]
pub struct WeightsFileFilter {
    pub origin_time: NaiveDateTime,
    /// 网络站号，空表示全部
    pub station_ids: Vec<i64>,
    pub steps: Vec<i32>,
}

// ==========================================
// FileWeightRepository - 权重文件仓储
// ==========================================
pub struct FileWeightRepository {
    label: String,
    producer_id: i64,
    period: PeriodBounds,
    tables: HashMap<(i32, String), WeightTable>,
}

impl FileWeightRepository {
    /// 读取并过滤权重文件
    ///
    /// # 错误
    /// - 文件不存在或扩展名既不是 .csv 也不是 .csv.gz
    /// - 行格式错误
    /// - 过滤后没有任何权重
    pub fn load(
        path: &Path,
        label: impl Into<String>,
        producer_id: i64,
        filter: &WeightsFileFilter,
    ) -> RepositoryResult<Self> {
        let label = label.into();
        let file_err = |message: String| RepositoryError::WeightsFileError {
            path: path.display().to_string(),
            message,
        };

        if !path.exists() {
            return Err(file_err("文件不存在".to_string()));
        }
        let file = File::open(path).map_err(|e| file_err(e.to_string()))?;
        let source: Box<dyn Read> = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Box::new(BufReader::new(file)),
            Some("gz") => Box::new(GzDecoder::new(BufReader::new(file))),
            other => {
                return Err(file_err(format!("不支持的扩展名 {:?}，应为 .csv 或 .csv.gz", other)));
            }
        };

        let period = find_period(&STANDARD_SEASONS, filter.origin_time.date())
            .ok_or_else(|| file_err(format!("分析日期 {} 无对应季节", filter.origin_time)))?;
        let analysis_hour = filter.origin_time.hour() as i32;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(source);

        info!(path = %path.display(), period = period.period_id, analysis_hour, "读取权重文件");

        let mut tables: HashMap<(i32, String), WeightTable> = HashMap::new();
        let mut num_lines = 0usize;
        let mut num_weights = 0usize;

        for record in reader.records() {
            let record = record.map_err(|e| file_err(e.to_string()))?;
            num_lines += 1;

            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row = parse_row(&record).map_err(|m| file_err(format!("第 {} 行: {}", line, m)))?;

            if row.period_id != period.period_id
                || row.analysis_hour != analysis_hour
                || !filter.steps.contains(&row.step)
                || !(filter.station_ids.is_empty() || filter.station_ids.contains(&row.station.network_station_id))
            {
                continue;
            }

            num_weights += 1;

            let set = PredictorSet::new(row.predictors, row.weights, period.clone(), row.step, &label)
                .map_err(|e| file_err(format!("第 {} 行: {}", line, e)))?;

            if !set.is_empty() {
                tables
                    .entry((row.step, row.target_param))
                    .or_default()
                    .insert(row.station, set);
            }
        }

        info!(lines = num_lines, weights = num_weights, "权重文件读取完成");

        if num_weights == 0 {
            return Err(file_err("过滤后没有任何权重".to_string()));
        }

        Ok(Self {
            label,
            producer_id,
            period,
            tables,
        })
    }

    pub fn period(&self) -> &PeriodBounds {
        &self.period
    }
}

struct FileRow {
    period_id: i32,
    analysis_hour: i32,
    station: Station,
    step: i32,
    target_param: String,
    predictors: Vec<PredictorIdentity>,
    weights: Vec<f64>,
}

fn parse_row(record: &csv::StringRecord) -> Result<FileRow, String> {
    if record.len() < FIXED_COLUMNS || (record.len() - FIXED_COLUMNS) % 2 != 0 {
        return Err(format!("列数 {} 无效", record.len()));
    }

    fn num<T: std::str::FromStr>(record: &csv::StringRecord, idx: usize, name: &str) -> Result<T, String> {
        record
            .get(idx)
            .and_then(|v| v.parse::<T>().ok())
            .ok_or_else(|| format!("{} 无法解析", name))
    }

    let station_id: i64 = num(record, 2, "station_id")?;
    let longitude: f64 = num(record, 3, "lon")?;
    let latitude: f64 = num(record, 4, "lat")?;

    let mut predictors = Vec::new();
    let mut weights = Vec::new();
    for idx in (FIXED_COLUMNS..record.len()).step_by(2) {
        let key = &record[idx];
        predictors.push(key.parse::<PredictorIdentity>().map_err(|e| e.to_string())?);
        weights.push(num::<f64>(record, idx + 1, key)?);
    }

    Ok(FileRow {
        period_id: num(record, 0, "period_id")?,
        analysis_hour: num(record, 1, "analysis_hour")?,
        station: Station::new(station_id, station_id, String::new(), latitude, longitude),
        step: num(record, 5, "step")?,
        target_param: record[6].to_string(),
        predictors,
        weights,
    })
}

impl WeightRepository for FileWeightRepository {
    fn run_info(&self, label: &str) -> RepositoryResult<RunInfo> {
        Ok(RunInfo {
            version_id: 0,
            label: if label.is_empty() { self.label.clone() } else { label.to_string() },
            producer_id: self.producer_id,
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
        period_id: Option<i32>,
    ) -> RepositoryResult<WeightTable> {
        if period_id.is_some_and(|id| id != self.period.period_id) {
            debug!(?period_id, "权重文件只包含当前时段");
            return Ok(WeightTable::new());
        }

        let table = self
            .tables
            .get(&(step, target_param.to_string()))
            .map(|t| {
                t.iter()
                    .filter(|(s, _)| ctx.accepts_station(s.network_station_id))
                    .map(|(s, w)| (s.clone(), w.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(table)
    }

    fn write_trace(
        &self,
        _ctx: &RunContext,
        target_param: &str,
        results: &[StationForecast],
        _run_time: NaiveDateTime,
    ) -> RepositoryResult<()> {
        warn!(param = target_param, rows = results.len(), "权重文件模式不支持审计轨迹，已忽略");
        Ok(())
    }
}
