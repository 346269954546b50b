// ==========================================
// MOS 统计订正系统 - 气候训练时段
// ==========================================
// 时段按 月/日 定义，跨年时段（如 12-01 ~ 02-28）需按年份展开
// 闰日 02-29 按 02-28 处理
// ==========================================

use crate::domain::weight::PeriodBounds;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClimatePeriod {
    pub id: i32,
    pub start_month: u32,
    pub start_day: u32,
    pub stop_month: u32,
    pub stop_day: u32,
}

impl ClimatePeriod {
    pub const fn new(id: i32, start_month: u32, start_day: u32, stop_month: u32, stop_day: u32) -> Self {
        Self {
            id,
            start_month,
            start_day,
            stop_month,
            stop_day,
        }
    }

    fn wraps_year(&self) -> bool {
        (self.stop_month, self.stop_day) < (self.start_month, self.start_day)
    }

    /// 以 start_year 为起始年份展开的具体日期区间
    pub fn occurrence(&self, start_year: i32) -> Option<PeriodBounds> {
        let stop_year = if self.wraps_year() { start_year + 1 } else { start_year };
        Some(PeriodBounds {
            period_id: self.id,
            start: clamped_date(start_year, self.start_month, self.start_day)?,
            stop: clamped_date(stop_year, self.stop_month, self.stop_day)?,
        })
    }

    /// 包含给定日期的区间
    pub fn containing(&self, date: NaiveDate) -> Option<PeriodBounds> {
        let date = without_leap_day(date);
        [date.year() - 1, date.year()]
            .into_iter()
            .filter_map(|y| self.occurrence(y))
            .find(|b| b.start <= date && date <= b.stop)
    }

    /// 起始日最接近给定日期的区间（用于相邻时段）
    pub fn nearest(&self, date: NaiveDate) -> Option<PeriodBounds> {
        [date.year() - 1, date.year(), date.year() + 1]
            .into_iter()
            .filter_map(|y| self.occurrence(y))
            .min_by_key(|b| (b.start - date).num_days().abs())
    }
}

/// 标准四季: 1=冬(DJF) 2=春(MAM) 3=夏(JJA) 4=秋(SON)
pub const STANDARD_SEASONS: [ClimatePeriod; 4] = [
    ClimatePeriod::new(1, 12, 1, 2, 28),
    ClimatePeriod::new(2, 3, 1, 5, 31),
    ClimatePeriod::new(3, 6, 1, 8, 31),
    ClimatePeriod::new(4, 9, 1, 11, 30),
];

/// 查找包含分析日期的时段
pub fn find_period(periods: &[ClimatePeriod], date: NaiveDate) -> Option<PeriodBounds> {
    periods.iter().find_map(|p| p.containing(date))
}

/// 季节过渡所用的相邻时段
///
/// 位置 < 0.5 取前一时段，否则取后一时段（按 id 循环）
pub fn adjacent_period(
    periods: &[ClimatePeriod],
    current_id: i32,
    seasonal_position: f64,
) -> Option<ClimatePeriod> {
    let mut sorted: Vec<ClimatePeriod> = periods.to_vec();
    sorted.sort_by_key(|p| p.id);

    if sorted.len() < 2 {
        return None;
    }

    let idx = sorted.iter().position(|p| p.id == current_id)?;
    let n = sorted.len();
    let adjacent = if seasonal_position < 0.5 {
        (idx + n - 1) % n
    } else {
        (idx + 1) % n
    };

    Some(sorted[adjacent])
}

/// 分析日期在时段内的相对位置 [0, 1]
pub fn seasonal_position(bounds: &PeriodBounds, date: NaiveDate) -> Option<f64> {
    let date = without_leap_day(date);
    let length = (bounds.stop - bounds.start).num_days();
    if length <= 0 || date < bounds.start || date > bounds.stop {
        return None;
    }
    Some((date - bounds.start).num_days() as f64 / length as f64)
}

fn without_leap_day(date: NaiveDate) -> NaiveDate {
    if date.month() == 2 && date.day() == 29 {
        NaiveDate::from_ymd_opt(date.year(), 2, 28).unwrap_or(date)
    } else {
        date
    }
}

fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}
