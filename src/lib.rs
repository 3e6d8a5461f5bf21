// ==========================================
// 库存成本核算系统 - 核心库
// ==========================================
// 职责: 进货成本批次、多币种估值、FIFO 销售成本核算
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 备注/供应商字段的落库加密接口
pub mod cipher;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CurrencyAmount, ItemKey, Session, ROLE_ADMIN, ROLE_OPERATOR};

// 领域实体
pub use domain::{
    ActionLog, ActionType, AllocationOutcome, ImportBatch, ImportRecord, InventorySnapshot,
    NewImport, ProductCodeMapping, SaleAllocation, SaleRequest, StockValuation,
};

// 引擎
pub use engine::{
    AccessGuard, BatchLedger, EngineError, FifoAllocator, FxRateResolver, InventoryAggregate,
    ProductCodeRegistry, RateSource,
};

// API
pub use api::{ApiError, InventoryApi, ProductCodeApi, SalesApi, SettingsApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "库存成本核算系统";
