// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 配置写入后对其他连接可见，命令行覆盖持久化策略
// ==========================================


use mos_evaluator::config::{config_keys, ConfigError, ConfigManager};
use mos_evaluator::db::open_sqlite_connection;
use mos_evaluator::{BlendMode, MissingValuePolicy};
use test_helpers::create_test_db;

#[test]
fn test_values_visible_across_connections() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    {
        let conn = open_sqlite_connection(&db_path).unwrap();
        let manager = ConfigManager::new(&conn);
        manager
            .set_config_value(config_keys::MISSING_VALUE_POLICY, "STRICT")
            .unwrap();
        manager
            .set_config_value(config_keys::MISSING_VALUE_SUBSTITUTES, r#"{"CLDBASE-M": 25000.0}"#)
            .unwrap();
        // 覆盖写入
        manager
            .set_config_value(config_keys::MISSING_VALUE_POLICY, "SKIP_STEP")
            .unwrap();
    }

    let conn = open_sqlite_connection(&db_path).unwrap();
    let manager = ConfigManager::new(&conn);
    let config = manager
        .load_evaluation_config("MOS_ECMWF_TEST", None, false)
        .unwrap();

    assert_eq!(config.missing_policy, MissingValuePolicy::SkipStep);
    assert_eq!(config.substitutes.get("CLDBASE-M"), Some(&25000.0));
    assert_eq!(config.blend_mode, BlendMode::Mix);

    let config = manager
        .load_evaluation_config("MOS_ECMWF_TEST", Some(MissingValuePolicy::Graceful), true)
        .unwrap();
    assert_eq!(config.missing_policy, MissingValuePolicy::Graceful);
    assert!(config.seasonal_blend);
}

#[test]
fn test_malformed_step_scheme() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_sqlite_connection(&db_path).unwrap();
    let manager = ConfigManager::new(&conn);

    manager
        .set_config_value(
            &format!("{}MOS_BAD", config_keys::STEP_SCHEME_PREFIX),
            r#"{"hourly_until":150,"three_hourly_until":144}"#,
        )
        .unwrap();

    assert!(matches!(
        manager.load_evaluation_config("MOS_BAD", None, false),
        Err(ConfigError::Malformed { .. })
    ));
}
