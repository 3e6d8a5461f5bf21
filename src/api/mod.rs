// ==========================================
// 库存成本核算系统 - API 层
// ==========================================
// 职责: 组合引擎、权限校验、审计与库存重建，向调用方提供用例接口
// ==========================================

pub mod error;
pub mod inventory_api;
pub mod product_code_api;
pub mod sales_api;
pub mod settings_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use inventory_api::InventoryApi;
pub use product_code_api::ProductCodeApi;
pub use sales_api::SalesApi;
pub use settings_api::SettingsApi;
