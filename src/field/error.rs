// ==========================================
// MOS 统计订正系统 - 场数据层错误类型
// ==========================================
// 红线: 场数据错误一律不重试，直接终止工作线程
// 原因: 用错误数据替代会污染统计订正结果
// ==========================================

use crate::field::provider::FieldRequest;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("未知数据生产者: {0}")]
    UnknownProducer(i64),

    #[error("生产者 {producer_id} 在 {analysis_time} 无可用网格几何")]
    NoGeometry {
        producer_id: i64,
        analysis_time: String,
    },

    #[error("场目录中无数据: {0}")]
    NoData(Box<FieldRequest>),

    #[error("场数据解码失败: {0}")]
    Decode(String),

    #[error("场目录查询失败: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type FieldResult<T> = Result<T, FieldError>;
