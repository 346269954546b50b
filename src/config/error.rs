// ==========================================
// MOS 统计订正系统 - 配置层错误类型
// ==========================================
// 红线: 配置错误在任何计算开始前终止进程
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("缺少必需参数: {0}")]
    Missing(&'static str),

    #[error("参数无效 ({option}): {message}")]
    Invalid { option: &'static str, message: String },

    #[error("配置项格式错误 (key={key}): {message}")]
    Malformed { key: String, message: String },

    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
