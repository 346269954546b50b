// ==========================================
// MOS 统计订正系统 - 太阳赤纬
// ==========================================
// 只依赖有效时刻（起报时间 + 时效），与站点无关
// 日序先减 32 天，结果小于 0 时加 365
// ==========================================

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use std::f64::consts::PI;

/// 太阳赤纬（度）
pub fn declination(origin_time: NaiveDateTime, step: i32) -> f64 {
    let valid = origin_time + Duration::hours(step as i64);

    let mut day = valid.ordinal0() as f64 + valid.hour() as f64 / 24.0 - 32.0;
    if day < 0.0 {
        day += 365.0;
    }

    let deg = 2.0 * PI / 360.0;
    let angle = 0.98565 * deg * (day + 10.0) + 1.914 * deg * (0.98565 * deg * (day - 2.0)).sin();

    -(0.39779 * angle.cos()).asin() * 360.0 / 2.0 / PI
}
