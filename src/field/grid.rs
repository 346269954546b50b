// ==========================================
// MOS 统计订正系统 - 规则经纬度网格
// ==========================================
// 存储: 行主序，自西南角起，j 方向向北递增
// 缺测: 网格点为 NaN
// 插值: 双线性 / 最近点；任一参与插值的格点缺测则结果缺测
// ==========================================

use crate::domain::InterpolationMethod;
use crate::field::error::{FieldError, FieldResult};
use crate::field::provider::InterpolatableField;

/// 网格几何描述（来自场目录）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub ni: usize,
    pub nj: usize,
    pub first_lon: f64,
    pub first_lat: f64,
    pub last_lon: f64,
    pub last_lat: f64,
    pub j_scans_positively: bool,
}

#[derive(Debug, Clone)]
pub struct LatLonGrid {
    ni: usize,
    nj: usize,
    west: f64,
    south: f64,
    dx: f64,
    dy: f64,
    values: Vec<f64>,
    method: InterpolationMethod,
}

impl LatLonGrid {
    /// 由几何与原始格点值构造
    ///
    /// j 方向向南扫描的网格会被翻转为向北
    pub fn new(geometry: GridGeometry, mut values: Vec<f64>, method: InterpolationMethod) -> FieldResult<Self> {
        let GridGeometry { ni, nj, .. } = geometry;

        if ni < 2 || nj < 2 {
            return Err(FieldError::Decode(format!("网格尺寸过小: {}x{}", ni, nj)));
        }
        if ni.checked_mul(nj) != Some(values.len()) {
            return Err(FieldError::Decode(format!(
                "格点数 {} 与网格尺寸 {}x{} 不一致",
                values.len(),
                ni,
                nj
            )));
        }

        let (south, north) = if geometry.j_scans_positively {
            (geometry.first_lat, geometry.last_lat)
        } else {
            flip_rows(&mut values, ni, nj);
            (geometry.last_lat, geometry.first_lat)
        };

        let west = geometry.first_lon;
        let mut east = geometry.last_lon;
        if east < west {
            east += 360.0;
        }

        if north <= south {
            return Err(FieldError::Decode(format!("纬度范围无效: {} .. {}", south, north)));
        }

        Ok(Self {
            ni,
            nj,
            west,
            south,
            dx: (east - west) / (ni - 1) as f64,
            dy: (north - south) / (nj - 1) as f64,
            values,
            method,
        })
    }

    /// 由 little-endian f64 字节流构造
    pub fn from_le_bytes(geometry: GridGeometry, bytes: &[u8], method: InterpolationMethod) -> FieldResult<Self> {
        if bytes.len() % 8 != 0 {
            return Err(FieldError::Decode(format!("字节长度 {} 不是 8 的倍数", bytes.len())));
        }

        let values = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_le_bytes(buf)
            })
            .collect();

        Self::new(geometry, values, method)
    }

    fn point(&self, i: usize, j: usize) -> Option<f64> {
        let v = self.values[j * self.ni + i];
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }

    /// 经度归一到网格西边界起的区间
    fn normalize_lon(&self, longitude: f64) -> f64 {
        let mut lon = longitude;
        while lon < self.west {
            lon += 360.0;
        }
        while lon - 360.0 >= self.west {
            lon -= 360.0;
        }
        lon
    }
}

impl InterpolatableField for LatLonGrid {
    fn value_at(&self, latitude: f64, longitude: f64) -> Option<f64> {
        let x = (self.normalize_lon(longitude) - self.west) / self.dx;
        let y = (latitude - self.south) / self.dy;

        let max_x = (self.ni - 1) as f64;
        let max_y = (self.nj - 1) as f64;
        if !(0.0..=max_x).contains(&x) || !(0.0..=max_y).contains(&y) {
            return None;
        }

        match self.method {
            InterpolationMethod::NearestPoint => self.point(x.round() as usize, y.round() as usize),
            InterpolationMethod::Bilinear => {
                let i0 = (x.floor() as usize).min(self.ni - 2);
                let j0 = (y.floor() as usize).min(self.nj - 2);
                let fx = x - i0 as f64;
                let fy = y - j0 as f64;

                let v00 = self.point(i0, j0)?;
                let v10 = self.point(i0 + 1, j0)?;
                let v01 = self.point(i0, j0 + 1)?;
                let v11 = self.point(i0 + 1, j0 + 1)?;

                let south = v00 * (1.0 - fx) + v10 * fx;
                let north = v01 * (1.0 - fx) + v11 * fx;
                Some(south * (1.0 - fy) + north * fy)
            }
        }
    }
}

fn flip_rows(values: &mut [f64], ni: usize, nj: usize) {
    for y in 0..nj / 2 {
        let (upper, lower) = values.split_at_mut((nj - 1 - y) * ni);
        upper[y * ni..(y + 1) * ni].swap_with_slice(&mut lower[..ni]);
    }
}
