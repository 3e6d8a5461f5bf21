// ==========================================
// 库存成本核算系统 - 引擎层
// ==========================================
// 职责: 实现成本核算业务规则,不拼 SQL
// 红线: Engine 不拼 SQL, 可预期的拒绝以类型化错误返回
// ==========================================

pub mod access_guard;
pub mod batch_ledger;
pub mod error;
pub mod fifo_allocation;
pub mod fx_resolver;
pub mod inventory_aggregate;
pub mod product_code_registry;
pub mod rate_source;

// 重导出核心引擎
pub use access_guard::AccessGuard;
pub use batch_ledger::BatchLedger;
pub use error::{EngineError, EngineResult};
pub use fifo_allocation::{plan_fifo, FifoAllocator};
pub use fx_resolver::FxRateResolver;
pub use inventory_aggregate::InventoryAggregate;
pub use product_code_registry::{validate_mapping, ProductCodeRegistry};
pub use rate_source::{FxError, HttpRateSource, RateSource};
