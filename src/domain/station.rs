// ==========================================
// MOS 统计订正系统 - 站点
// ==========================================
// 红线: 相等性与排序按网络站号（如 WMO 站号），不按内部 id
// 原因: 权重表与场值查询均以网络站号关联
// ==========================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// 观测网络: WMO
pub const NETWORK_WMO: i32 = 1;

/// 观测网络: FMISID
pub const NETWORK_FMISID: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub network_station_id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Station {
    pub fn new(
        id: i64,
        network_station_id: i64,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id,
            network_station_id,
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.network_station_id == other.network_station_id
    }
}

impl Eq for Station {}

impl PartialOrd for Station {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Station {
    fn cmp(&self, other: &Self) -> Ordering {
        self.network_station_id.cmp(&other.network_station_id)
    }
}

impl Hash for Station {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.network_station_id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_follows_network_id() {
        let a = Station::new(1, 2974, "Helsinki-Vantaa", 60.32, 24.96);
        let b = Station::new(99, 2974, "EFHK", 60.3, 24.9);
        let c = Station::new(1, 2963, "Jokioinen", 60.81, 23.5);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(c < a);
    }
}
