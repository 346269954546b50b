// ==========================================
// MOS 统计订正系统 - 结果写出层
// ==========================================
// 职责: 每个 (参数, 时效) 一个 CSV 文件
// ==========================================

pub mod error;
pub mod writer;

pub use error::{OutputError, OutputResult};
pub use writer::{result_file_name, CsvResultWriter, ResultWriter, OUTPUT_TIME_FORMAT};
