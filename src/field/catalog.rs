// ==========================================
// MOS 统计订正系统 - SQLite 场目录
// ==========================================
// 职责: 按 生产者 + 分析时间 查找网格几何，再按参数/层次/时效取格点数据
// 几何优先级: 全球(ECGLO*) > 欧洲(ECEUR*) > 其他；取到第一个即停止
// 红线: 只读，不含业务规则（参数映射、时间调整由引擎完成）
// ==========================================

use crate::field::error::{FieldError, FieldResult};
use crate::field::grid::{GridGeometry, LatLonGrid};
use crate::field::provider::{FieldHandle, FieldProvider, FieldRequest};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, info};

/// 场目录中的时间格式
pub const CATALOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// SqliteFieldProvider - 场目录提供者
// ==========================================
/// C 可以是独占的 Connection，也可以是连接池句柄
pub struct SqliteFieldProvider<C> {
    conn: C,
}

impl<C: Deref<Target = Connection>> SqliteFieldProvider<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// 生产者在该分析时间下的网格几何（已按优先级排序）
    fn geometries(&self, producer_id: i64, analysis_time: &str) -> FieldResult<Vec<(i64, String)>> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT id FROM producer WHERE id = ?1", params![producer_id], |row| row.get(0))
            .optional()?;

        if exists.is_none() {
            return Err(FieldError::UnknownProducer(producer_id));
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT g.id, g.name
            FROM grid_field f
            JOIN geometry g ON g.id = f.geometry_id
            WHERE f.producer_id = ?1 AND f.analysis_time = ?2
            ORDER BY g.id
            "#,
        )?;

        let mut geoms = stmt
            .query_map(params![producer_id, analysis_time], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(i64, String)>>>()?;

        if geoms.is_empty() {
            return Err(FieldError::NoGeometry {
                producer_id,
                analysis_time: analysis_time.to_string(),
            });
        }

        geoms.sort_by_key(|(_, name)| geometry_rank(name));
        Ok(geoms)
    }
}

/// 几何优先级（数值越小越优先）
fn geometry_rank(name: &str) -> u8 {
    if name.contains("ECGLO") {
        0
    } else if name.contains("ECEUR") {
        1
    } else {
        2
    }
}

impl<C: Deref<Target = Connection>> FieldProvider for SqliteFieldProvider<C> {
    fn resolve(&self, request: &FieldRequest) -> FieldResult<Vec<FieldHandle>> {
        let analysis_time = request.origin_time.format(CATALOG_TIME_FORMAT).to_string();
        let geoms = self.geometries(request.producer_id, &analysis_time)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT ni, nj, first_lon, first_lat, last_lon, last_lat, j_scans_positively, grid_values
            FROM grid_field
            WHERE producer_id = ?1
              AND geometry_id = ?2
              AND analysis_time = ?3
              AND param_name = upper(?4)
              AND level_name = upper(?5)
              AND level_value = ?6
              AND forecast_hours = ?7
            "#,
        )?;

        let mut ret: Vec<FieldHandle> = Vec::new();

        for (geometry_id, geometry_name) in &geoms {
            let row = stmt
                .query_row(
                    params![
                        request.producer_id,
                        geometry_id,
                        analysis_time,
                        request.param_name,
                        request.level_name,
                        request.level_value,
                        request.step,
                    ],
                    |row| {
                        Ok((
                            (row.get::<_, i64>(0)?, row.get::<_, i64>(1)?),
                            (
                                row.get::<_, f64>(2)?,
                                row.get::<_, f64>(3)?,
                                row.get::<_, f64>(4)?,
                                row.get::<_, f64>(5)?,
                            ),
                            row.get::<_, i64>(6)? != 0,
                            row.get::<_, Vec<u8>>(7)?,
                        ))
                    },
                )
                .optional()?;

            let Some(((ni, nj), (first_lon, first_lat, last_lon, last_lat), j_scans_positively, bytes)) = row else {
                debug!(geometry = %geometry_name, request = %request, "该几何无数据");
                continue;
            };

            let geometry = GridGeometry {
                ni: grid_dimension(ni)?,
                nj: grid_dimension(nj)?,
                first_lon,
                first_lat,
                last_lon,
                last_lat,
                j_scans_positively,
            };

            info!(geometry = %geometry_name, request = %request, "读取场数据");
            let grid = LatLonGrid::from_le_bytes(geometry, &bytes, request.interpolation)?;
            ret.push(Arc::new(grid));
            break; // 取到第一个几何即停止
        }

        if ret.is_empty() {
            return Err(FieldError::NoData(Box::new(request.clone())));
        }

        Ok(ret)
    }

    fn latest_analysis_time(&self, producer_id: i64, geometry: &str) -> FieldResult<Option<NaiveDateTime>> {
        let latest: Option<String> = self.conn.query_row(
            r#"
            SELECT MAX(f.analysis_time)
            FROM grid_field f
            JOIN geometry g ON g.id = f.geometry_id
            WHERE f.producer_id = ?1 AND g.name = ?2
            "#,
            params![producer_id, geometry],
            |row| row.get(0),
        )?;

        latest
            .map(|s| {
                NaiveDateTime::parse_from_str(&s, CATALOG_TIME_FORMAT)
                    .map_err(|e| FieldError::Decode(format!("分析时间 '{}' 格式错误: {}", s, e)))
            })
            .transpose()
    }
}

fn grid_dimension(raw: i64) -> FieldResult<usize> {
    usize::try_from(raw).map_err(|_| FieldError::Decode(format!("网格尺寸无效: {}", raw)))
}

/// 写入一个网格场（导入工具与测试共用）
#[allow(clippy::too_many_arguments)]
pub fn insert_grid_field(
    conn: &Connection,
    producer_id: i64,
    geometry_id: i64,
    analysis_time: NaiveDateTime,
    param_name: &str,
    level_name: &str,
    level_value: f64,
    forecast_hours: i32,
    geometry: GridGeometry,
    values: &[f64],
) -> rusqlite::Result<()> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    conn.execute(
        r#"
        INSERT OR REPLACE INTO grid_field (
            producer_id, geometry_id, analysis_time, param_name, level_name, level_value,
            forecast_hours, ni, nj, first_lon, first_lat, last_lon, last_lat,
            j_scans_positively, grid_values
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            producer_id,
            geometry_id,
            analysis_time.format(CATALOG_TIME_FORMAT).to_string(),
            param_name.to_uppercase(),
            level_name.to_uppercase(),
            level_value,
            forecast_hours,
            geometry.ni as i64,
            geometry.nj as i64,
            geometry.first_lon,
            geometry.first_lat,
            geometry.last_lon,
            geometry.last_lat,
            geometry.j_scans_positively as i64,
            bytes,
        ],
    )?;
    Ok(())
}
