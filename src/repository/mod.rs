// ==========================================
// 库存成本核算系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod allocation_repo;
pub mod error;
pub mod fx_rate_repo;
pub mod import_repo;
pub mod inventory_repo;
pub mod product_code_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use allocation_repo::SaleAllocationRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use fx_rate_repo::FxRateRepository;
pub use import_repo::ImportRepository;
pub use inventory_repo::InventoryRepository;
pub use product_code_repo::{ProductCodeRepository, SerialReservation};
