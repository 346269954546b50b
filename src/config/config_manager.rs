// ==========================================
// MOS 统计订正系统 - 配置管理器
// ==========================================
// 职责: 读取持久化配置，与命令行参数合并为引擎配置
// 存储: config_kv 表 (key-value + scope)
// 优先级: 命令行 > config_kv > 内置默认值
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::{BlendMode, MissingValuePolicy, StepScheme};
use crate::pool::DEFAULT_POOL_WAIT_MS;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 步长分档（按标签，JSON）
    pub const STEP_SCHEME_PREFIX: &str = "step_scheme/";

    // 缺测处理
    pub const MISSING_VALUE_POLICY: &str = "missing_value_policy";
    pub const MISSING_VALUE_SUBSTITUTES: &str = "missing_value_substitutes"; // 参数 → 替代值 (JSON)

    // 季节过渡
    pub const BLEND_MODE: &str = "blend_mode";

    // 连接池
    pub const POOL_WAIT_MS: &str = "pool_wait_ms";
}

/// 云底高缺测时的替代值（米）
pub const CLOUD_BASE_SENTINEL_M: f64 = 30000.0;

/// 默认替代值表
pub fn default_substitutes() -> HashMap<String, f64> {
    HashMap::from([("CLDBASE-M".to_string(), CLOUD_BASE_SENTINEL_M)])
}

// ==========================================
// EvaluationConfig - 引擎配置
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    pub step_scheme: StepScheme,
    pub missing_policy: MissingValuePolicy,
    pub substitutes: HashMap<String, f64>,
    pub blend_mode: BlendMode,
    pub seasonal_blend: bool,
    pub pool_wait: Duration,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            step_scheme: StepScheme::default(),
            missing_policy: MissingValuePolicy::default(),
            substitutes: default_substitutes(),
            blend_mode: BlendMode::default(),
            seasonal_blend: false,
            pool_wait: Duration::from_millis(DEFAULT_POOL_WAIT_MS),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
/// C 可以是独占的 Connection，也可以是连接池句柄
pub struct ConfigManager<C> {
    conn: C,
}

impl<C: Deref<Target = Connection>> ConfigManager<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let result = self.conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入 global scope 的配置值
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn parse_value<T: FromStr>(&self, key: &str) -> ConfigResult<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        self.get_config_value(key)?
            .map(|raw| {
                raw.parse::<T>().map_err(|e| ConfigError::Malformed {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    fn parse_json<T: DeserializeOwned>(&self, key: &str) -> ConfigResult<Option<T>> {
        self.get_config_value(key)?
            .map(|raw| {
                serde_json::from_str::<T>(&raw).map_err(|e| ConfigError::Malformed {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// 标签对应的步长分档
    pub fn step_scheme(&self, label: &str) -> ConfigResult<StepScheme> {
        let key = format!("{}{}", config_keys::STEP_SCHEME_PREFIX, label);
        let scheme = self.parse_json::<StepScheme>(&key)?.unwrap_or_default();

        if scheme.hourly_until < 0 || scheme.three_hourly_until < scheme.hourly_until {
            return Err(ConfigError::Malformed {
                key,
                message: format!("{} / {}", scheme.hourly_until, scheme.three_hourly_until),
            });
        }
        Ok(scheme)
    }

    pub fn missing_value_policy(&self) -> ConfigResult<MissingValuePolicy> {
        Ok(self
            .parse_value(config_keys::MISSING_VALUE_POLICY)?
            .unwrap_or_default())
    }

    pub fn missing_value_substitutes(&self) -> ConfigResult<HashMap<String, f64>> {
        Ok(self
            .parse_json(config_keys::MISSING_VALUE_SUBSTITUTES)?
            .unwrap_or_else(default_substitutes))
    }

    pub fn blend_mode(&self) -> ConfigResult<BlendMode> {
        Ok(self.parse_value(config_keys::BLEND_MODE)?.unwrap_or_default())
    }

    pub fn pool_wait(&self) -> ConfigResult<Duration> {
        let ms = self
            .parse_value::<u64>(config_keys::POOL_WAIT_MS)?
            .unwrap_or(DEFAULT_POOL_WAIT_MS);
        Ok(Duration::from_millis(ms))
    }

    /// 加载引擎配置
    ///
    /// # 参数
    /// - label: MOS 标签（决定步长分档）
    /// - policy_override: 命令行指定的缺测策略
    /// - seasonal_blend: 命令行是否启用季节过渡
    pub fn load_evaluation_config(
        &self,
        label: &str,
        policy_override: Option<MissingValuePolicy>,
        seasonal_blend: bool,
    ) -> ConfigResult<EvaluationConfig> {
        let config = EvaluationConfig {
            step_scheme: self.step_scheme(label)?,
            missing_policy: match policy_override {
                Some(p) => p,
                None => self.missing_value_policy()?,
            },
            substitutes: self.missing_value_substitutes()?,
            blend_mode: self.blend_mode()?,
            seasonal_blend,
            pool_wait: self.pool_wait()?,
        };

        debug!(label, ?config, "引擎配置已加载");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_defaults_without_rows() {
        let conn = setup();
        let manager = ConfigManager::new(&conn);

        let config = manager.load_evaluation_config("MOS_TEST", None, false).unwrap();
        assert_eq!(config, EvaluationConfig::default());
        assert_eq!(config.substitutes.get("CLDBASE-M"), Some(&CLOUD_BASE_SENTINEL_M));
    }

    #[test]
    fn test_persisted_values_and_cli_override() {
        let conn = setup();
        let manager = ConfigManager::new(&conn);
        manager
            .set_config_value("step_scheme/MOS_ECMWF_r144", r#"{"hourly_until":0,"three_hourly_until":144}"#)
            .unwrap();
        manager.set_config_value(config_keys::MISSING_VALUE_POLICY, "SKIP_STEP").unwrap();
        manager.set_config_value(config_keys::BLEND_MODE, "PASSTHROUGH").unwrap();
        manager.set_config_value(config_keys::POOL_WAIT_MS, "20").unwrap();

        let config = manager.load_evaluation_config("MOS_ECMWF_r144", None, true).unwrap();
        assert_eq!(config.step_scheme.hourly_until, 0);
        assert_eq!(config.missing_policy, MissingValuePolicy::SkipStep);
        assert_eq!(config.blend_mode, BlendMode::Passthrough);
        assert_eq!(config.pool_wait, Duration::from_millis(20));
        assert!(config.seasonal_blend);

        let config = manager
            .load_evaluation_config("MOS_ECMWF_r144", Some(MissingValuePolicy::Strict), false)
            .unwrap();
        assert_eq!(config.missing_policy, MissingValuePolicy::Strict);

        // 其他标签仍使用默认分档
        assert_eq!(manager.step_scheme("MOS_OTHER").unwrap(), StepScheme::default());
    }

    #[test]
    fn test_malformed_values_rejected() {
        let conn = setup();
        let manager = ConfigManager::new(&conn);
        manager.set_config_value(config_keys::MISSING_VALUE_POLICY, "SOMETIMES").unwrap();
        assert!(matches!(
            manager.missing_value_policy(),
            Err(ConfigError::Malformed { .. })
        ));

        manager
            .set_config_value("step_scheme/BAD", r#"{"hourly_until":150,"three_hourly_until":144}"#)
            .unwrap();
        assert!(manager.step_scheme("BAD").is_err());
    }
}
