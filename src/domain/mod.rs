// ==========================================
// 库存成本核算系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod batch;
pub mod import;
pub mod inventory;
pub mod product_code;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use batch::{
    AllocationDraft, AllocationOutcome, BatchCandidate, BatchValuation, ImportBatch, ProfitSummary,
    SaleAllocation, SaleRequest,
};
pub use import::{ImportRecord, NewImport};
pub use inventory::{InventorySnapshot, StockValuation};
pub use product_code::{MappingConflict, MappingRule, ProductCodeMapping};
pub use types::{normalize_currency, CurrencyAmount, ItemKey, Session, ROLE_ADMIN, ROLE_OPERATOR};
