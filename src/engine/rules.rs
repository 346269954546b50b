// ==========================================
// MOS 统计订正系统 - 因子领域规则
// ==========================================
// 静态知识表，全部按参数名匹配:
// - 参数/层次别名（训练所用数据在场目录中的实际存放位置）
// - 累积量 / 辐射累积量
// - 单位换算
// - 已知的模式输出缺口
// - 插值方式
// ==========================================

use crate::domain::InterpolationMethod;

/// 逐小时降水所在的生产者
pub const HOURLY_PRECIPITATION_PRODUCER_ID: i64 = 240;

/// 从分析时刻起累积的参数
pub const CUMULATIVE_PARAMS: &[&str] = &["EVAP-KGM2", "RUNOFF-M", "SUBRUNOFF-M", "RRC-KGM2", "RRL-KGM2"];

/// 辐射累积量（能量积分，差分后换算为平均功率）
pub const RADIATIVE_PARAMS: &[&str] = &[
    "FLSEN-JM2",
    "FLLAT-JM2",
    "RNETSW-WM2",
    "RNETLW-WM2",
    "RADDIRSOLAR-JM2",
    "RADLW-WM2",
    "RADGLO-WM2",
];

/// 时效超过该值后不存在的3小时统计量
const THREE_HOUR_STATS: &[&str] = &["FFG3H-MS", "TMAX3H-K", "TMIN3H-K"];
const THREE_HOUR_STATS_LAST_STEP: i32 = 144;

/// 日平均气温，时效小于该值时回归系数为零
pub const MEAN_TEMPERATURE_PARAM: &str = "T-MEAN-K";
const MEAN_TEMPERATURE_FIRST_STEP: i32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    None,
    Cumulative,
    Radiative,
}

pub fn accumulation(param_name: &str) -> Accumulation {
    if CUMULATIVE_PARAMS.contains(&param_name) {
        Accumulation::Cumulative
    } else if RADIATIVE_PARAMS.contains(&param_name) {
        Accumulation::Radiative
    } else {
        Accumulation::None
    }
}

/// 场中实际查询的参数位置
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAlias {
    pub param_name: String,
    pub level_name: String,
    /// Some 表示改用其他生产者
    pub producer_id: Option<i64>,
}

/// 参数/层次别名
pub fn remap(param_name: &str, level_name: &str) -> FieldAlias {
    let alias = |param: &str, level: &str, producer: Option<i64>| FieldAlias {
        param_name: param.to_string(),
        level_name: level.to_string(),
        producer_id: producer,
    };
    let hourly = Some(HOURLY_PRECIPITATION_PRODUCER_ID);

    match (param_name, level_name) {
        // 降水必须使用1小时累积
        ("RR-KGM2", _) => alias("RRR-KGM2", "HEIGHT", hourly),
        ("RRC-KGM2", _) => alias("RRRC-KGM2", "HEIGHT", hourly),
        ("RRL-KGM2", _) => alias("RRRL-KGM2", "HEIGHT", hourly),
        ("TOTCW-KGM2", _) => alias("TCW-KGM2", level_name, None),
        // 海平面气压存放在 GROUND 层
        ("P-PA", "MEANSEA") => alias("P-PA", "GROUND", None),
        // 云量以 0..1 存放
        ("NL-PRCNT", _) => alias("NL-0TO1", level_name, None),
        ("NM-PRCNT", _) => alias("NM-0TO1", level_name, None),
        ("NH-PRCNT", _) => alias("NH-0TO1", level_name, None),
        _ => alias(param_name, level_name, None),
    }
}

/// 单位换算系数
pub fn scale_factor(param_name: &str) -> f64 {
    match param_name {
        "POTVORT-N" | "ABSVO-HZ" => 1_000_000.0,
        "SD-M" | "EVAP-KGM2" | "RUNOFF-M" | "SUBRUNOFF-M" => 1000.0,
        "ALBEDO-PRCNT" | "IC-0TO1" | "LC-0TO1" => 100.0,
        _ => 1.0,
    }
}

/// 已知缺口: 不查场，贡献为零
pub fn is_structural_gap(param_name: &str, step: i32) -> bool {
    (step > THREE_HOUR_STATS_LAST_STEP && THREE_HOUR_STATS.contains(&param_name))
        || (step < MEAN_TEMPERATURE_FIRST_STEP && param_name == MEAN_TEMPERATURE_PARAM)
}

/// 参数在首档是否有逐小时输出
pub fn has_hourly_output(param_name: &str) -> bool {
    param_name != MEAN_TEMPERATURE_PARAM
}

/// 日平均气温取上一次起报时缺失时效的替代时效
///
/// 147/153 不存在，退到 144/150；逐小时档内退到 3 的倍数
pub fn snap_mean_temperature_step(step: i32) -> Option<i32> {
    if step == 147 || step == 153 {
        Some(step - 3)
    } else if step <= 90 && step % 3 != 0 {
        Some(step - step % 3)
    } else {
        None
    }
}

pub fn interpolation_method(param_name: &str) -> InterpolationMethod {
    match param_name {
        "RR-KGM2" | "RRL-KGM2" | "RRC-KGM2" => InterpolationMethod::NearestPoint,
        _ => InterpolationMethod::Bilinear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precipitation_aliases_switch_producer() {
        let a = remap("RR-KGM2", "GROUND");
        assert_eq!(a.param_name, "RRR-KGM2");
        assert_eq!(a.level_name, "HEIGHT");
        assert_eq!(a.producer_id, Some(HOURLY_PRECIPITATION_PRODUCER_ID));

        assert_eq!(remap("RRL-KGM2", "GROUND").param_name, "RRRL-KGM2");
        assert_eq!(remap("RRC-KGM2", "GROUND").param_name, "RRRC-KGM2");
    }

    #[test]
    fn test_level_and_name_aliases() {
        assert_eq!(remap("P-PA", "MEANSEA").level_name, "GROUND");
        assert_eq!(remap("P-PA", "HYBRID").level_name, "HYBRID");
        assert_eq!(remap("NL-PRCNT", "GROUND").param_name, "NL-0TO1");
        assert_eq!(remap("TOTCW-KGM2", "GROUND").param_name, "TCW-KGM2");

        let same = remap("T-K", "PRESSURE");
        assert_eq!(same.param_name, "T-K");
        assert_eq!(same.producer_id, None);
    }

    #[test]
    fn test_gaps() {
        assert!(is_structural_gap("FFG3H-MS", 150));
        assert!(!is_structural_gap("FFG3H-MS", 144));
        assert!(is_structural_gap("T-MEAN-K", 144));
        assert!(!is_structural_gap("T-MEAN-K", 150));
        assert!(!is_structural_gap("T-K", 240));
    }

    #[test]
    fn test_mean_temperature_snapping() {
        assert_eq!(snap_mean_temperature_step(147), Some(144));
        assert_eq!(snap_mean_temperature_step(153), Some(150));
        assert_eq!(snap_mean_temperature_step(25), Some(24));
        assert_eq!(snap_mean_temperature_step(24), None);
        assert_eq!(snap_mean_temperature_step(162), None);
    }

    #[test]
    fn test_tables() {
        assert_eq!(accumulation("EVAP-KGM2"), Accumulation::Cumulative);
        assert_eq!(accumulation("RADGLO-WM2"), Accumulation::Radiative);
        assert_eq!(accumulation("T-K"), Accumulation::None);
        assert_eq!(scale_factor("SD-M"), 1000.0);
        assert_eq!(scale_factor("T-K"), 1.0);
        assert_eq!(interpolation_method("RR-KGM2"), InterpolationMethod::NearestPoint);
        assert_eq!(interpolation_method("T-K"), InterpolationMethod::Bilinear);
        assert!(!has_hourly_output("T-MEAN-K"));
    }
}
