// ==========================================
// MOS 统计订正系统 - 结果写出错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    // ===== 文件 =====
    #[error("结果文件写入失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 写入失败: {0}")]
    Csv(#[from] csv::Error),

    // ===== 编码表 =====
    #[error("目标参数在 param 表中不存在: {0}")]
    UnknownTargetParam(String),

    #[error("层次在 level 表中不存在: {0}")]
    UnknownLevel(String),

    #[error("编码表读取失败: {0}")]
    Catalog(#[from] rusqlite::Error),
}

pub type OutputResult<T> = Result<T, OutputError>;
