// ==========================================
// MOS 统计订正系统 - 命令行参数
// ==========================================
// CliOptions: clap 解析结果（原样）
// RunOptions: 校验后的不可变运行参数
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::{MissingValuePolicy, NETWORK_FMISID, NETWORK_WMO};
use chrono::{NaiveDateTime, Timelike};
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

/// 权重文件模式的默认生产者
pub const DEFAULT_FILE_PRODUCER_ID: i64 = 131;

/// 默认源数据几何
pub const DEFAULT_SOURCE_GEOMETRY: &str = "ECGLO0100";

/// 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(name = "mos-evaluator")]
#[command(about = "MOS 统计订正预报计算")]
#[command(version)]
#[command(after_help = "示例:\n  mos-evaluator -s 3 -e 6 -l 3 -m MOS_ECMWF_r144 --trace -p T-K\n  \
                        mos-evaluator -s 3 -e 6 -l 3 --weights-file weights.csv -m MOS_ECMWF_040422 -p T-K")]
pub struct CliOptions {
    /// MOS 标签
    #[arg(short = 'm', long = "mos-label")]
    pub mos_label: Option<String>,

    /// 工作线程数
    #[arg(short = 'j', long = "threads", default_value_t = 1)]
    pub threads: usize,

    /// 起始时效
    #[arg(short = 's', long = "start-step")]
    pub start_step: Option<i32>,

    /// 结束时效
    #[arg(short = 'e', long = "end-step")]
    pub end_step: Option<i32>,

    /// 时效间隔
    #[arg(short = 'l', long = "step-length", default_value_t = 1)]
    pub step_length: i32,

    /// 站号列表（逗号分隔）
    #[arg(short = 'S', long = "station-id", value_delimiter = ',')]
    pub station_ids: Vec<i64>,

    /// 观测网络 (1=WMO, 5=FMISID)
    #[arg(short = 'n', long = "network-id", default_value_t = NETWORK_WMO)]
    pub network_id: i32,

    /// 目标参数列表（逗号分隔）
    #[arg(short = 'p', long = "parameter", value_delimiter = ',')]
    pub parameters: Vec<String>,

    /// 输出审计轨迹
    #[arg(long)]
    pub trace: bool,

    /// 分析时间（YYYY-MM-DD HH:MM:SS，默认取场目录最新时间）
    #[arg(short = 'a', long = "analysis-time")]
    pub analysis_time: Option<String>,

    /// 从文件读取权重
    #[arg(long = "weights-file")]
    pub weights_file: Option<PathBuf>,

    /// 生产者（仅权重文件模式）
    #[arg(long = "producer-id", default_value_t = DEFAULT_FILE_PRODUCER_ID)]
    pub producer_id: i64,

    /// 数据库路径
    #[arg(long, env = "MOS_DB_PATH")]
    pub database: Option<String>,

    /// 结果文件目录
    #[arg(long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// 缺测策略 (STRICT / SKIP_STEP / GRACEFUL)，覆盖数据库配置
    #[arg(long = "missing-policy")]
    pub missing_policy: Option<MissingValuePolicy>,

    /// 启用季节过渡
    #[arg(long = "seasonal-blend")]
    pub seasonal_blend: bool,

    /// 源数据几何（用于确定最新分析时间）
    #[arg(long = "source-geometry", default_value = DEFAULT_SOURCE_GEOMETRY)]
    pub source_geometry: String,
}

/// 校验后的运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub label: String,
    pub threads: usize,
    pub start_step: i32,
    pub end_step: i32,
    pub step_length: i32,
    pub station_ids: Vec<i64>,
    pub network_id: i32,
    pub parameters: Vec<String>,
    pub trace: bool,
    pub analysis_time: Option<NaiveDateTime>,
    pub weights_file: Option<PathBuf>,
    pub producer_id: i64,
    pub database: Option<String>,
    pub output_dir: PathBuf,
    pub missing_policy: Option<MissingValuePolicy>,
    pub seasonal_blend: bool,
    pub source_geometry: String,
}

impl RunOptions {
    /// 请求的全部时效
    pub fn steps(&self) -> Vec<i32> {
        (self.start_step..=self.end_step)
            .step_by(self.step_length as usize)
            .collect()
    }
}

impl CliOptions {
    /// 校验参数组合
    pub fn validate(self) -> ConfigResult<RunOptions> {
        let (start_step, end_step) = match (self.start_step, self.end_step) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(ConfigError::Missing("start-step / end-step")),
        };

        if start_step < 0 || end_step < start_step {
            return Err(ConfigError::Invalid {
                option: "start-step / end-step",
                message: format!("{} .. {}", start_step, end_step),
            });
        }
        if self.step_length < 1 {
            return Err(ConfigError::Invalid {
                option: "step-length",
                message: self.step_length.to_string(),
            });
        }
        if self.threads < 1 {
            return Err(ConfigError::Invalid {
                option: "threads",
                message: self.threads.to_string(),
            });
        }
        if self.network_id != NETWORK_WMO && self.network_id != NETWORK_FMISID {
            return Err(ConfigError::Invalid {
                option: "network-id",
                message: self.network_id.to_string(),
            });
        }

        let label = self.mos_label.unwrap_or_default();
        if label.is_empty() && self.weights_file.is_none() {
            return Err(ConfigError::Missing("mos-label / weights-file"));
        }

        let parameters: Vec<String> = self
            .parameters
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if parameters.is_empty() {
            return Err(ConfigError::Missing("parameter"));
        }

        let mut trace = self.trace;
        if trace && self.weights_file.is_some() {
            warn!("权重文件模式不能输出审计轨迹，已关闭 --trace");
            trace = false;
        }

        let analysis_time = self
            .analysis_time
            .as_deref()
            .map(parse_analysis_time)
            .transpose()?;

        Ok(RunOptions {
            label,
            threads: self.threads,
            start_step,
            end_step,
            step_length: self.step_length,
            station_ids: self.station_ids,
            network_id: self.network_id,
            parameters,
            trace,
            analysis_time,
            weights_file: self.weights_file,
            producer_id: self.producer_id,
            database: self.database,
            output_dir: self.output_dir,
            missing_policy: self.missing_policy,
            seasonal_blend: self.seasonal_blend,
            source_geometry: self.source_geometry,
        })
    }
}

/// 解析分析时间（秒可省略）
pub fn parse_analysis_time(raw: &str) -> ConfigResult<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .map_err(|e| ConfigError::Invalid {
            option: "analysis-time",
            message: format!("'{}': {}", raw, e),
        })
}

/// 分析时次必须为 00 或 12
pub fn check_analysis_hour(origin_time: NaiveDateTime) -> ConfigResult<()> {
    match origin_time.hour() {
        0 | 12 if origin_time.minute() == 0 => Ok(()),
        _ => Err(ConfigError::Invalid {
            option: "analysis-time",
            message: format!("分析时次既不是 00 也不是 12 ({})", origin_time),
        }),
    }
}
