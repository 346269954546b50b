// ==========================================
// MOS 统计订正系统 - 季节过渡权重混合
// ==========================================
// 过渡系数: f = sin(π·x) · 0.5，x 为分析日期在时段内的相对位置
// MIX:         w = f·当前 + (1-f)·相邻时段（按因子标识匹配）
// PASSTHROUGH: w = 当前（保留历史行为）
// 相邻时段中没有的站点原样保留
// ==========================================

use crate::domain::{BlendMode, WeightTable};
use crate::engine::error::{EngineError, EngineResult};
use std::f64::consts::PI;
use tracing::debug;

/// 过渡系数
pub fn blend_factor(seasonal_position: f64) -> f64 {
    (PI * seasonal_position).sin() * 0.5
}

/// 混合当前时段与相邻时段的权重表
///
/// 相邻时段缺少的因子按权重 0 处理；只在相邻时段出现的因子不加入
pub fn blend(
    mut current: WeightTable,
    adjacent: &WeightTable,
    seasonal_position: f64,
    mode: BlendMode,
) -> EngineResult<WeightTable> {
    if !(0.0..=1.0).contains(&seasonal_position) {
        return Err(EngineError::NumericInvariant(format!(
            "季节位置超出 [0, 1]: {}",
            seasonal_position
        )));
    }

    if mode == BlendMode::Passthrough {
        return Ok(current);
    }

    let f = blend_factor(seasonal_position);
    let mut blended_stations = 0usize;

    for (station, set) in current.iter_mut() {
        let Some(other) = adjacent.get(station) else {
            continue;
        };

        let mixed: Vec<f64> = set
            .predictors()
            .iter()
            .zip(set.weights())
            .map(|(p, w)| f * w + (1.0 - f) * other.weight_of(p).unwrap_or(0.0))
            .collect();

        for (i, w) in mixed.into_iter().enumerate() {
            set.set_weight(i, w);
        }
        blended_stations += 1;
    }

    debug!(factor = f, stations = blended_stations, "季节过渡完成");
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PeriodBounds, PredictorIdentity, PredictorSet, Station};
    use chrono::NaiveDate;

    fn period(id: i32) -> PeriodBounds {
        PeriodBounds {
            period_id: id,
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            stop: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        }
    }

    fn set(period_id: i32, entries: &[(&str, f64)]) -> PredictorSet {
        let predictors: Vec<PredictorIdentity> = entries.iter().map(|(k, _)| k.parse().unwrap()).collect();
        let weights = entries.iter().map(|(_, w)| *w).collect();
        PredictorSet::new(predictors, weights, period(period_id), 12, "MOS_TEST").unwrap()
    }

    fn helsinki() -> Station {
        Station::new(10, 2974, "Helsinki-Vantaa", 60.32, 24.96)
    }

    fn jokioinen() -> Station {
        Station::new(11, 2963, "Jokioinen", 60.81, 23.5)
    }

    #[test]
    fn test_blend_factor_shape() {
        assert_eq!(blend_factor(0.0), 0.0);
        assert!((blend_factor(0.5) - 0.5).abs() < 1e-12);
        assert!(blend_factor(1.0).abs() < 1e-12);
        assert!(blend_factor(0.25) > 0.0 && blend_factor(0.25) < 0.5);
    }

    #[test]
    fn test_mix_matches_predictors_by_identity() {
        let mut current = WeightTable::new();
        current.insert(helsinki(), set(2, &[("T-K/GROUND/0", 1.0), ("TD-K/GROUND/0", 0.4)]));
        current.insert(jokioinen(), set(2, &[("T-K/GROUND/0", 2.0)]));

        // 顺序不同，且缺少 TD-K
        let mut adjacent = WeightTable::new();
        adjacent.insert(helsinki(), set(3, &[("RH-PRCNT/GROUND/0", 9.0), ("T-K/GROUND/0", 3.0)]));

        let blended = blend(current, &adjacent, 0.5, BlendMode::Mix).unwrap();

        let h = &blended[&helsinki()];
        assert_eq!(h.len(), 2);
        assert!((h.weights()[0] - 2.0).abs() < 1e-12);
        assert!((h.weights()[1] - 0.2).abs() < 1e-12);

        // 相邻时段没有该站点
        assert_eq!(blended[&jokioinen()].weights(), &[2.0]);
    }

    #[test]
    fn test_boundary_takes_adjacent_weight() {
        let mut current = WeightTable::new();
        current.insert(helsinki(), set(2, &[("T-K/GROUND/0", 1.0)]));
        let mut adjacent = WeightTable::new();
        adjacent.insert(helsinki(), set(1, &[("T-K/GROUND/0", 3.0)]));

        let blended = blend(current, &adjacent, 0.0, BlendMode::Mix).unwrap();
        assert_eq!(blended[&helsinki()].weights(), &[3.0]);
    }

    #[test]
    fn test_passthrough_keeps_current() {
        let mut current = WeightTable::new();
        current.insert(helsinki(), set(2, &[("T-K/GROUND/0", 1.0)]));
        let mut adjacent = WeightTable::new();
        adjacent.insert(helsinki(), set(1, &[("T-K/GROUND/0", 3.0)]));

        let blended = blend(current.clone(), &adjacent, 0.3, BlendMode::Passthrough).unwrap();
        assert_eq!(blended, current);
    }

    #[test]
    fn test_position_out_of_range() {
        let err = blend(WeightTable::new(), &WeightTable::new(), 1.5, BlendMode::Mix).unwrap_err();
        assert!(matches!(err, EngineError::NumericInvariant(_)));
    }
}
