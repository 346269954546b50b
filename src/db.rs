// ==========================================
// MOS 统计订正系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，多个工作线程同时读库时减少偶发 busy 错误
// - 提供权重库 / 场目录 / 配置表的建表语句
// ==========================================

use crate::pool::Poolable;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 完整建表语句（幂等）
///
/// 说明：
/// - mos_version / mos_period / mos_weight / mos_trace: 权重仓储
/// - producer / geometry / grid_field: 场目录（数值模式输出）
/// - config_kv: 全局配置
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS param (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS level (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS station (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS station_network_mapping (
    station_id INTEGER NOT NULL REFERENCES station(id) ON DELETE CASCADE,
    network_id INTEGER NOT NULL,
    local_station_id INTEGER NOT NULL,
    PRIMARY KEY (station_id, network_id)
);

CREATE TABLE IF NOT EXISTS mos_version (
    id INTEGER PRIMARY KEY,
    label TEXT NOT NULL UNIQUE,
    producer_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS mos_period (
    id INTEGER PRIMARY KEY,
    start_month INTEGER NOT NULL,
    start_day INTEGER NOT NULL,
    stop_month INTEGER NOT NULL,
    stop_day INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS mos_weight (
    mos_version_id INTEGER NOT NULL REFERENCES mos_version(id) ON DELETE CASCADE,
    mos_period_id INTEGER NOT NULL REFERENCES mos_period(id),
    station_id INTEGER NOT NULL REFERENCES station(id),
    target_param_id INTEGER NOT NULL REFERENCES param(id),
    analysis_hour INTEGER NOT NULL,
    forecast_hours INTEGER NOT NULL,
    weights TEXT NOT NULL,
    PRIMARY KEY (mos_version_id, mos_period_id, station_id, target_param_id, analysis_hour, forecast_hours)
);

CREATE TABLE IF NOT EXISTS mos_trace (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    mos_version_id INTEGER NOT NULL,
    mos_period_id INTEGER NOT NULL,
    analysis_time TEXT NOT NULL,
    station_id INTEGER NOT NULL,
    forecast_hours INTEGER NOT NULL,
    target_param_id INTEGER NOT NULL,
    target_level_id INTEGER NOT NULL,
    target_level_value REAL NOT NULL,
    weights TEXT NOT NULL,
    source_values TEXT NOT NULL,
    value REAL NOT NULL,
    run_time TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS producer (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS geometry (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS grid_field (
    producer_id INTEGER NOT NULL REFERENCES producer(id),
    geometry_id INTEGER NOT NULL REFERENCES geometry(id),
    analysis_time TEXT NOT NULL,
    param_name TEXT NOT NULL,
    level_name TEXT NOT NULL,
    level_value REAL NOT NULL,
    forecast_hours INTEGER NOT NULL,
    ni INTEGER NOT NULL,
    nj INTEGER NOT NULL,
    first_lon REAL NOT NULL,
    first_lat REAL NOT NULL,
    last_lon REAL NOT NULL,
    last_lat REAL NOT NULL,
    j_scans_positively INTEGER NOT NULL DEFAULT 1,
    grid_values BLOB NOT NULL,
    PRIMARY KEY (producer_id, geometry_id, analysis_time, param_name, level_name, level_value, forecast_hours)
);

CREATE INDEX IF NOT EXISTS idx_grid_field_lookup
    ON grid_field (producer_id, analysis_time, param_name, level_name, forecast_hours);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 已知标签的步长分档（仅在缺少配置时写入，不覆盖现有值）
pub const KNOWN_STEP_SCHEMES: [(&str, &str); 1] = [(
    "step_scheme/MOS_ECMWF_040422",
    r#"{"hourly_until":90,"three_hourly_until":144}"#,
)];

/// 建表并写入 schema_version 与已知标签分档（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    for (key, value) in KNOWN_STEP_SCHEMES {
        conn.execute(
            "INSERT OR IGNORE INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
            [key, value],
        )?;
    }
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 MOS_DB_PATH > 用户数据目录 > 当前目录
pub fn default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("MOS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./mos.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("mos-evaluator");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("mos.db");
        }
    }

    path.to_string_lossy().to_string()
}

// ==========================================
// 连接池接入
// ==========================================

impl Poolable for Connection {
    /// 归还连接前回滚未提交事务
    fn reset(&mut self) {
        if !self.is_autocommit() {
            if let Err(e) = self.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "归还连接时回滚失败");
            }
        }
    }
}
