// ==========================================
// MOS 统计订正系统 - 场数据层
// ==========================================
// 职责: 数值模式网格场的查找、解码与站点插值
// 红线: 不含 MOS 业务规则，不做参数映射
// ==========================================

pub mod catalog;
pub mod error;
pub mod grid;
pub mod provider;

pub use catalog::{insert_grid_field, SqliteFieldProvider, CATALOG_TIME_FORMAT};
pub use error::{FieldError, FieldResult};
pub use grid::{GridGeometry, LatLonGrid};
pub use provider::{FieldHandle, FieldProvider, FieldRequest, InterpolatableField};
